//! Explicit state-clearing operations.
//!
//! These are the only paths that remove checkpoints or move a Completed
//! lesson backwards. Unlocked lessons stay unlocked.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::curriculum::{Curriculum, LessonId, UnitId};
use crate::document::ProgressDocument;
use crate::error::{ProgressError, Result};
use crate::username::Username;

/// Clear the tutorial checkpoints and status.
pub fn reset_tutorial(document: &mut ProgressDocument, now: DateTime<Utc>) {
    document.tutorial.reset();
    document.derive_pointers();
    document.updated_at = Some(now);
    debug!(username = %document.username, "Tutorial reset");
}

/// Clear one lesson's checkpoints, score fields and attempt date.
pub fn reset_lesson(
    document: &mut ProgressDocument,
    curriculum: &Curriculum,
    unit_id: UnitId,
    lesson_id: LessonId,
    now: DateTime<Utc>,
) -> Result<()> {
    curriculum.check_lesson(unit_id, lesson_id)?;
    document.ensure_units(curriculum);

    let unit = document.unit_mut(unit_id)?;
    let lesson = unit.lesson_mut(lesson_id).ok_or_else(|| {
        ProgressError::NotFound(format!("Unknown lesson '{}' in {}", lesson_id, unit_id))
    })?;
    lesson.reset();
    unit.clear_mirror(lesson_id);
    unit.recompute();

    document.derive_pointers();
    document.updated_at = Some(now);
    debug!(
        username = %document.username,
        unit = %unit_id,
        lesson = %lesson_id,
        "Lesson reset"
    );
    Ok(())
}

/// A fresh default document for `username`.
pub fn reset_document(username: Username, curriculum: &Curriculum) -> ProgressDocument {
    ProgressDocument::new(username, curriculum)
}
