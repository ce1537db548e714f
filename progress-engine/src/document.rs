//! Per-student progress document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::curriculum::{Curriculum, LessonId, UnitId};
use crate::error::{ProgressError, Result};
use crate::lesson::Lesson;
use crate::tutorial::Tutorial;
use crate::types::UnitStatus;
use crate::unit::Unit;
use crate::username::Username;

/// Where a checkpoint lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Tutorial,
    Lesson { unit: UnitId, lesson: LessonId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    pub username: Username,
    pub tutorial: Tutorial,
    pub units: BTreeMap<UnitId, Unit>,
    /// Derived; recomputed on every merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_unit: Option<UnitId>,
    /// Derived; recomputed on every merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lesson: Option<LessonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressDocument {
    /// Default document: tutorial not started, the entry unit open on its
    /// first lesson, every other unit locked.
    pub fn new(username: Username, curriculum: &Curriculum) -> Self {
        let entry = curriculum.entry_unit();
        let units = curriculum
            .units()
            .map(|id| (id, Unit::new(curriculum, id == entry)))
            .collect();

        let mut document = Self {
            username,
            tutorial: Tutorial::default(),
            units,
            current_unit: None,
            current_lesson: None,
            updated_at: None,
        };
        document.derive_pointers();
        document
    }

    /// Add any configured unit missing from a stored document (the curriculum grew).
    pub fn ensure_units(&mut self, curriculum: &Curriculum) {
        let entry = curriculum.entry_unit();
        for id in curriculum.units() {
            self.units
                .entry(id)
                .or_insert_with(|| Unit::new(curriculum, id == entry));
        }
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.units
            .get(&id)
            .ok_or_else(|| ProgressError::NotFound(format!("Unknown unit '{}'", id)))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units
            .get_mut(&id)
            .ok_or_else(|| ProgressError::NotFound(format!("Unknown unit '{}'", id)))
    }

    pub fn lesson(&self, unit: UnitId, lesson: LessonId) -> Result<&Lesson> {
        self.unit(unit)?.lesson(lesson).ok_or_else(|| {
            ProgressError::NotFound(format!("Unknown lesson '{}' in {}", lesson, unit))
        })
    }

    pub fn checkpoints(&self, scope: Scope) -> Result<&CheckpointStore> {
        match scope {
            Scope::Tutorial => Ok(&self.tutorial.checkpoints),
            Scope::Lesson { unit, lesson } => Ok(&self.lesson(unit, lesson)?.checkpoints),
        }
    }

    pub fn checkpoint(&self, scope: Scope, name: &str) -> Result<Option<&Checkpoint>> {
        Ok(self.checkpoints(scope)?.get(name))
    }

    /// Names of Completed checkpoints in `scope`.
    pub fn completed_checkpoints(&self, scope: Scope) -> Result<Vec<String>> {
        Ok(self.checkpoints(scope)?.completed_names(None))
    }

    /// Re-derive every unit's aggregates.
    pub fn recompute_units(&mut self) {
        for unit in self.units.values_mut() {
            unit.recompute();
        }
    }

    /// Point at the first unfinished unit and its open lesson.
    pub fn derive_pointers(&mut self) {
        let current = self
            .units
            .iter()
            .find(|(_, u)| u.status != UnitStatus::Completed)
            .or_else(|| self.units.iter().next_back());

        match current {
            Some((id, unit)) => {
                self.current_unit = Some(*id);
                self.current_lesson = unit.current_lesson();
            }
            None => {
                self.current_unit = None;
                self.current_lesson = None;
            }
        }
    }

    /// Apply a client's pointer override if it names a reachable lesson.
    ///
    /// Returns false when the override was ignored.
    pub fn override_pointers(&mut self, unit: Option<UnitId>, lesson: Option<LessonId>) -> bool {
        let Some(unit_id) = unit.or(self.current_unit) else {
            return false;
        };
        let Some(target) = self.units.get(&unit_id) else {
            return false;
        };
        let lesson_id = match lesson.or_else(|| target.current_lesson()) {
            Some(id) => id,
            None => return false,
        };
        match target.lesson(lesson_id) {
            Some(l) if !l.is_locked() => {
                self.current_unit = Some(unit_id);
                self.current_lesson = Some(lesson_id);
                true
            }
            _ => false,
        }
    }
}
