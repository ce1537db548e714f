//! Curriculum progress tracking for Questline
//!
//! This crate holds the per-student progress document and the merge engine that
//! folds partial, possibly repeated or out-of-order updates from game clients
//! into it:
//!
//! - **Tutorial**: NPC checkpoints gating the entry unit
//! - **Units**: a pre-test, an ordered lesson sequence and a post-test
//! - **Lessons**: `Locked -> Available -> InProgress -> Completed`, never backwards
//! - **Checkpoints**: per-NPC interaction records inside a lesson or the tutorial
//!
//! # Key Components
//!
//! - [`Curriculum`]: Closed configuration of which units and lessons exist
//! - [`ProgressDocument`]: Durable per-student state
//! - [`ProgressPatch`]: Partial update as sent by a client
//! - [`merge`]: Pure merge of a patch into a document
//!
//! The crate does no I/O. Callers load a document, merge, and persist the result.
//!
//! # Example
//!
//! ```ignore
//! use progress_engine::{merge, Curriculum, ProgressPatch};
//!
//! let patch: ProgressPatch = serde_json::from_str(body)?;
//! let outcome = merge(stored, &patch, &Curriculum::default(), Utc::now())?;
//! store.save(&outcome.document).await?;
//! ```

pub mod checkpoint;
pub mod curriculum;
pub mod document;
pub mod error;
pub mod lesson;
pub mod merge;
pub mod patch;
pub mod reset;
pub mod tutorial;
pub mod types;
pub mod unit;
pub mod username;

// Re-export main types
pub use checkpoint::{Checkpoint, CheckpointStore, CheckpointUpdate};
pub use curriculum::{Curriculum, LessonId, UnitId};
pub use document::{ProgressDocument, Scope};
pub use error::{ProgressError, Result};
pub use lesson::{Lesson, ScoreSummary, TestAttempt};
pub use merge::{merge, MergeOutcome, Transition};
pub use patch::{LessonPatch, PostTestResult, ProgressPatch, TutorialPatch, UnitPatch};
pub use reset::{reset_document, reset_lesson, reset_tutorial};
pub use tutorial::Tutorial;
pub use types::*;
pub use unit::{TestScores, Unit};
pub use username::Username;
