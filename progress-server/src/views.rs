//! View types - API response shapes
//!
//! These wrap stored records for the HTTP layer. Account views use the
//! PascalCase field names the game client already reads; progress views use
//! camelCase like the progress document itself.

use progress_engine::{
    Checkpoint, LessonId, LessonStatus, ProgressDocument, Reward, UnitId, UnitStatus,
};
use serde::Serialize;

use crate::store::{ClassroomRecord, UserRecord};

// ============================================================================
// Accounts
// ============================================================================

/// A user without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserView {
    pub username: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.to_string(),
            role: record.role.clone(),
            section: record.section.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            character: record.character.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassroomResponse {
    pub message: String,
    pub classroom: ClassroomRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassroomsResponse {
    pub classrooms: Vec<ClassroomRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// A progress document with the revision it was read or written at.
///
/// `revision` is absent for a default document that has never been saved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(flatten)]
    pub document: ProgressDocument,
}

/// Result of a single checkpoint write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointView {
    pub unit: UnitId,
    pub lesson: LessonId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
    pub checkpoint: Checkpoint,
    pub lesson_status: LessonStatus,
}

/// Result of recording a post-test.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTestView {
    pub unit: UnitId,
    pub status: LessonStatus,
    pub score: Option<u32>,
    pub total_questions: Option<u32>,
    pub score_display: Option<String>,
    pub passed: Option<bool>,
    pub reward: Option<Reward>,
    pub unit_status: UnitStatus,
    /// The unit whose pre-test this result opened, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_unit: Option<UnitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCheckpointsView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonId>,
    pub completed: Vec<String>,
}
