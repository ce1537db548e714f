//! Checkpoint store: per-NPC interaction records scoped under a lesson or the tutorial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{score_display, CheckpointStatus, Reward};

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub status: CheckpointStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
}

impl Checkpoint {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: CheckpointStatus::NotCompleted,
            reward: None,
            date: now,
            message: String::new(),
            score: None,
            total_questions: None,
            score_display: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CheckpointStatus::Completed
    }
}

/// Partial checkpoint fields sent by a client. Absent fields keep their prior value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckpointStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
}

impl CheckpointUpdate {
    /// Marks a checkpoint Completed and touches nothing else.
    pub fn completed() -> Self {
        Self {
            status: Some(CheckpointStatus::Completed),
            ..Default::default()
        }
    }
}

/// Checkpoints keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointStore {
    entries: BTreeMap<String, Checkpoint>,
}

impl CheckpointStore {
    /// Insert or overwrite the named checkpoint.
    ///
    /// A Completed checkpoint stays Completed. `date` moves to `now` unless the
    /// update carries its own. `scoreDisplay` is re-derived whenever the update
    /// touches the score and does not supply a display of its own.
    pub fn upsert(
        &mut self,
        name: &str,
        update: &CheckpointUpdate,
        now: DateTime<Utc>,
    ) -> &Checkpoint {
        let checkpoint = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Checkpoint::new(now));

        if let Some(status) = update.status {
            checkpoint.status = checkpoint.status.max(status);
        }
        if let Some(reward) = update.reward {
            checkpoint.reward = Some(reward);
        }
        if let Some(ref message) = update.message {
            checkpoint.message = message.clone();
        }
        if let Some(score) = update.score {
            checkpoint.score = Some(score);
        }
        if let Some(total) = update.total_questions {
            checkpoint.total_questions = Some(total);
        }

        if let Some(ref display) = update.score_display {
            checkpoint.score_display = Some(display.clone());
        } else if update.score.is_some() || update.total_questions.is_some() {
            if let (Some(score), Some(total)) = (checkpoint.score, checkpoint.total_questions) {
                checkpoint.score_display = Some(score_display(score, total));
            }
        }

        checkpoint.date = update.date.unwrap_or(now);
        checkpoint
    }

    pub fn get(&self, name: &str) -> Option<&Checkpoint> {
        self.entries.get(name)
    }

    /// Names of Completed checkpoints, restricted to `filter` when given.
    pub fn completed_names(&self, filter: Option<&[String]>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, cp)| cp.is_completed())
            .filter(|(name, _)| filter.map_or(true, |f| f.iter().any(|n| n == *name)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether every name in `names` is Completed.
    pub fn all_completed(&self, names: &[String]) -> bool {
        names
            .iter()
            .all(|n| self.entries.get(n).is_some_and(Checkpoint::is_completed))
    }

    /// Whether any name in `names` is Completed.
    pub fn any_completed(&self, names: &[String]) -> bool {
        names
            .iter()
            .any(|n| self.entries.get(n).is_some_and(Checkpoint::is_completed))
    }

    /// Remove every checkpoint. Only reset operations call this.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Checkpoint)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
