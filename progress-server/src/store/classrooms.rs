//! Classrooms in a sled tree, keyed by join code

use progress_engine::Username;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, encode};
use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomRecord {
    pub name: String,
    pub code: String,
    pub teacher_username: Username,
}

pub struct ClassroomStore {
    tree: sled::Tree,
}

impl ClassroomStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("classrooms")?;
        Ok(Self { tree })
    }

    /// Insert a classroom. Fails with `Duplicate` if the code is taken.
    pub fn insert(&self, record: &ClassroomRecord) -> Result<()> {
        let bytes = encode(record)?;
        let swapped = self.tree.compare_and_swap(
            record.code.as_bytes(),
            None as Option<&[u8]>,
            Some(bytes),
        )?;
        swapped.map_err(|_| {
            ServerError::Duplicate(format!("Classroom code '{}' already exists", record.code))
        })?;

        debug!(code = %record.code, teacher = %record.teacher_username, "Classroom stored");
        Ok(())
    }

    pub fn get(&self, code: &str) -> Result<Option<ClassroomRecord>> {
        match self.tree.get(code.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All classrooms owned by `teacher`, ordered by code.
    pub fn list_by_teacher(&self, teacher: &Username) -> Result<Vec<ClassroomRecord>> {
        let mut classrooms = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            let record: ClassroomRecord = decode(&value)?;
            if record.teacher_username == *teacher {
                classrooms.push(record);
            }
        }
        Ok(classrooms)
    }

    /// Returns whether a classroom was removed.
    pub fn delete(&self, code: &str) -> Result<bool> {
        Ok(self.tree.remove(code.as_bytes())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classroom(name: &str, code: &str, teacher: &str) -> ClassroomRecord {
        ClassroomRecord {
            name: name.into(),
            code: code.into(),
            teacher_username: Username::parse(teacher).unwrap(),
        }
    }

    #[test]
    fn test_list_by_teacher() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        let store = ClassroomStore::open(&db).unwrap();

        store.insert(&classroom("Math 7", "B200", "tess")).unwrap();
        store.insert(&classroom("Math 8", "A100", "tess")).unwrap();
        store.insert(&classroom("Science", "C300", "omar")).unwrap();

        let listed = store.list_by_teacher(&Username::parse("Tess").unwrap()).unwrap();
        let codes: Vec<_> = listed.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["A100", "B200"]);

        assert!(matches!(
            store.insert(&classroom("Again", "A100", "omar")),
            Err(ServerError::Duplicate(_))
        ));
        assert!(store.delete("A100").unwrap());
        assert!(!store.delete("A100").unwrap());
        assert!(store.get("A100").unwrap().is_none());
    }
}
