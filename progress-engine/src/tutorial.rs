//! Tutorial state: NPC checkpoints gating the entry unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointStore, CheckpointUpdate};
use crate::types::TutorialStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutorial {
    pub status: TutorialStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkpoints: CheckpointStore,
}

impl Tutorial {
    /// Upsert an NPC checkpoint and re-derive the tutorial status.
    ///
    /// Returns true when this call moved the tutorial to Completed.
    pub fn apply_checkpoint(
        &mut self,
        npc: &str,
        update: &CheckpointUpdate,
        required: &[String],
        now: DateTime<Utc>,
    ) -> bool {
        self.checkpoints.upsert(npc, update, now);
        self.date = Some(now);
        self.recompute_status(required)
    }

    /// Returns true when the status changed to Completed.
    pub fn recompute_status(&mut self, required: &[String]) -> bool {
        let before = self.status;
        self.status = if self.checkpoints.all_completed(required) {
            TutorialStatus::Completed
        } else if self.checkpoints.any_completed(required) {
            TutorialStatus::InProgress
        } else {
            TutorialStatus::NotStarted
        };
        before != TutorialStatus::Completed && self.status == TutorialStatus::Completed
    }

    pub fn is_completed(&self) -> bool {
        self.status == TutorialStatus::Completed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::Curriculum;

    #[test]
    fn test_status_progression() {
        let required = Curriculum::default().tutorial_npcs;
        let mut tutorial = Tutorial::default();
        let now = Utc::now();

        assert!(!tutorial.apply_checkpoint("Janica", &CheckpointUpdate::completed(), &required, now));
        assert_eq!(tutorial.status, TutorialStatus::InProgress);

        // Optional NPCs do not count
        tutorial.apply_checkpoint("Shopkeeper", &CheckpointUpdate::completed(), &required, now);
        assert_eq!(tutorial.status, TutorialStatus::InProgress);

        tutorial.apply_checkpoint("Mark", &CheckpointUpdate::completed(), &required, now);
        tutorial.apply_checkpoint("Annie", &CheckpointUpdate::completed(), &required, now);
        assert!(tutorial.apply_checkpoint("Rojan", &CheckpointUpdate::completed(), &required, now));
        assert!(tutorial.is_completed());

        // Already completed: no second transition
        assert!(!tutorial.apply_checkpoint("Rojan", &CheckpointUpdate::completed(), &required, now));
    }

    #[test]
    fn test_not_started_without_completions() {
        let required = Curriculum::default().tutorial_npcs;
        let mut tutorial = Tutorial::default();
        tutorial.apply_checkpoint("Mark", &CheckpointUpdate::default(), &required, Utc::now());
        assert_eq!(tutorial.status, TutorialStatus::NotStarted);
        assert_eq!(tutorial.checkpoints.len(), 1);
    }
}
