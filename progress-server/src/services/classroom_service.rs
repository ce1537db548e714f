//! Classroom service - teacher-owned classrooms keyed by join code

use progress_engine::Username;
use serde::Deserialize;
use std::sync::Arc;

use super::events::{EventBus, ProgressEvent};
use crate::error::{Result, ServerError};
use crate::store::{ClassroomRecord, ClassroomStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateClassroomInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub teacher_username: Option<String>,
}

pub struct ClassroomService {
    classrooms: Arc<ClassroomStore>,
    events: Arc<EventBus>,
}

impl ClassroomService {
    pub fn new(classrooms: Arc<ClassroomStore>, events: Arc<EventBus>) -> Self {
        Self { classrooms, events }
    }

    pub fn create(&self, input: CreateClassroomInput) -> Result<ClassroomRecord> {
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (Some(name), Some(code), Some(teacher)) = (
            field(input.name),
            field(input.code),
            field(input.teacher_username),
        ) else {
            return Err(ServerError::Validation(
                "Name, code, and teacherUsername are required.".into(),
            ));
        };

        let record = ClassroomRecord {
            name,
            code,
            teacher_username: Username::parse(&teacher)?,
        };
        self.classrooms.insert(&record)?;

        self.events.emit(ProgressEvent::ClassroomCreated {
            code: record.code.clone(),
            teacher: record.teacher_username.clone(),
        });
        Ok(record)
    }

    pub fn list_by_teacher(&self, teacher: Option<&str>) -> Result<Vec<ClassroomRecord>> {
        let teacher = teacher
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServerError::Validation("teacherUsername is required.".into()))?;
        self.classrooms.list_by_teacher(&Username::parse(teacher)?)
    }

    /// Deleting an unknown code is not an error.
    pub fn delete(&self, code: &str) -> Result<bool> {
        let deleted = self.classrooms.delete(code)?;
        if deleted {
            self.events.emit(ProgressEvent::ClassroomDeleted {
                code: code.to_string(),
            });
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        let service = ClassroomService::new(
            Arc::new(ClassroomStore::open(&db).unwrap()),
            Arc::new(EventBus::new()),
        );

        assert!(matches!(
            service.create(CreateClassroomInput::default()),
            Err(ServerError::Validation(_))
        ));

        let created = service
            .create(CreateClassroomInput {
                name: Some("Grade 7 - Sampaguita".into()),
                code: Some("G7S".into()),
                teacher_username: Some("Ms.Cruz".into()),
            })
            .unwrap();
        assert_eq!(created.teacher_username.as_str(), "ms.cruz");

        assert_eq!(service.list_by_teacher(Some("MS.CRUZ")).unwrap().len(), 1);
        assert!(matches!(
            service.list_by_teacher(None),
            Err(ServerError::Validation(_))
        ));

        assert!(service.delete("G7S").unwrap());
        assert!(!service.delete("G7S").unwrap());
    }
}
