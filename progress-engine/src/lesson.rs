//! Lesson state: status, score mirror fields and the lesson's checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointStore;
use crate::types::{score_display, test_passed, LessonStatus, Reward};

/// One lesson, pre-test or post-test within a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub status: LessonStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkpoints: CheckpointStore,
    /// Tests only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// Score fields of a test, mirrored onto its unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// A scored test attempt, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAttempt {
    pub score: u32,
    pub total_questions: u32,
    pub score_display: Option<String>,
    pub passed: Option<bool>,
    pub reward: Option<Reward>,
}

impl TestAttempt {
    /// Caller's `passed` wins; otherwise half the questions or better passes.
    pub fn passed(&self) -> bool {
        self.passed
            .unwrap_or_else(|| test_passed(self.score, self.total_questions))
    }

    pub fn reward(&self) -> Reward {
        self.reward.unwrap_or_else(|| Reward::for_test(self.passed()))
    }

    pub fn display(&self) -> String {
        self.score_display
            .clone()
            .unwrap_or_else(|| score_display(self.score, self.total_questions))
    }
}

impl Lesson {
    pub fn locked() -> Self {
        Self::default()
    }

    pub fn available() -> Self {
        Self {
            status: LessonStatus::Available,
            ..Default::default()
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == LessonStatus::Locked
    }

    pub fn is_completed(&self) -> bool {
        self.status == LessonStatus::Completed
    }

    /// Move forward to `status`. Returns true if the status changed.
    pub fn advance(&mut self, status: LessonStatus) -> bool {
        if status > self.status {
            self.status = status;
            true
        } else {
            false
        }
    }

    /// Locked -> Available. Returns true if the lesson was locked.
    pub fn unlock(&mut self) -> bool {
        if self.is_locked() {
            self.status = LessonStatus::Available;
            true
        } else {
            false
        }
    }

    /// Record a test attempt onto the lesson-level score fields.
    pub fn record_test(&mut self, attempt: &TestAttempt) {
        self.score = Some(attempt.score);
        self.total_questions = Some(attempt.total_questions);
        self.score_display = Some(attempt.display());
        self.passed = Some(attempt.passed());
        self.reward = Some(attempt.reward());
    }

    /// Record a plain (non-test) score. Missing totals keep their stored value.
    pub fn record_score(
        &mut self,
        score: u32,
        total_questions: Option<u32>,
        display: Option<String>,
    ) {
        self.score = Some(score);
        if total_questions.is_some() {
            self.total_questions = total_questions;
        }
        self.score_display = match (display, self.total_questions) {
            (Some(display), _) => Some(display),
            (None, Some(total)) => Some(score_display(score, total)),
            (None, None) => self.score_display.take(),
        };
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            score: self.score,
            total_questions: self.total_questions,
            score_display: self.score_display.clone(),
            passed: self.passed,
        }
    }

    /// Clear recorded work. A lesson that was reachable stays reachable.
    pub fn reset(&mut self) {
        let status = if self.is_locked() {
            LessonStatus::Locked
        } else {
            LessonStatus::Available
        };
        *self = Self {
            status,
            ..Default::default()
        };
    }
}
