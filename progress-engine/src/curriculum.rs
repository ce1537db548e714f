//! Curriculum layout: which units and lessons exist.
//!
//! The curriculum is fixed content, not user data. Identifiers parse from
//! their wire strings (`Unit2`, `PreTest`, `Lesson4`, `PostTest`) and are then
//! checked against the configured counts; anything outside the configuration
//! is rejected rather than created on demand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProgressError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Unit identifier (`Unit1`, `Unit2`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(u8);

impl UnitId {
    pub fn new(number: u8) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit{}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("Unit")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| *n > 0)
            .map(UnitId)
            .ok_or_else(|| ProgressError::Validation(format!("Malformed unit id '{}'", s)))
    }
}

impl TryFrom<String> for UnitId {
    type Error = ProgressError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.to_string()
    }
}

/// Lesson identifier within a unit.
///
/// Ordering follows the play sequence: `PreTest < Lesson1 < ... < PostTest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LessonId {
    PreTest,
    Lesson(u8),
    PostTest,
}

impl LessonId {
    /// Pre-tests and post-tests carry a `passed` flag and a distinguished scorer checkpoint.
    pub fn is_test(&self) -> bool {
        matches!(self, LessonId::PreTest | LessonId::PostTest)
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonId::PreTest => f.write_str("PreTest"),
            LessonId::Lesson(n) => write!(f, "Lesson{}", n),
            LessonId::PostTest => f.write_str("PostTest"),
        }
    }
}

impl FromStr for LessonId {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PreTest" => Ok(LessonId::PreTest),
            "PostTest" => Ok(LessonId::PostTest),
            other => other
                .strip_prefix("Lesson")
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| *n > 0)
                .map(LessonId::Lesson)
                .ok_or_else(|| ProgressError::Validation(format!("Malformed lesson id '{}'", s))),
        }
    }
}

impl TryFrom<String> for LessonId {
    type Error = ProgressError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LessonId> for String {
    fn from(id: LessonId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Curriculum
// ============================================================================

/// Closed curriculum configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Curriculum {
    /// Number of units (`Unit1..UnitN`)
    pub unit_count: u8,
    /// Ordinary lessons per unit (`Lesson1..LessonM`)
    pub lessons_per_unit: u8,
    /// NPCs that must all be completed to finish the tutorial
    pub tutorial_npcs: Vec<String>,
    /// Checkpoint names whose score is authoritative for a pre-test
    pub pre_test_scorers: Vec<String>,
    /// Checkpoint names whose score is authoritative for a post-test.
    /// The first entry is the checkpoint written by explicit post-test results.
    pub post_test_scorers: Vec<String>,
}

impl Default for Curriculum {
    fn default() -> Self {
        Self {
            unit_count: 4,
            lessons_per_unit: 6,
            tutorial_npcs: ["Janica", "Mark", "Annie", "Rojan"]
                .into_iter()
                .map(String::from)
                .collect(),
            pre_test_scorers: vec!["Principal".to_string()],
            post_test_scorers: vec![
                "PrincipalPostTest".to_string(),
                "PrincipalPretest2".to_string(),
            ],
        }
    }
}

impl Curriculum {
    /// Check that the configuration describes a playable curriculum.
    pub fn validate(&self) -> Result<()> {
        if self.unit_count == 0 {
            return Err(ProgressError::Validation("unit_count must be at least 1".into()));
        }
        if self.lessons_per_unit == 0 {
            return Err(ProgressError::Validation(
                "lessons_per_unit must be at least 1".into(),
            ));
        }
        if self.tutorial_npcs.is_empty() {
            return Err(ProgressError::Validation("tutorial_npcs must not be empty".into()));
        }
        if self.pre_test_scorers.is_empty() || self.post_test_scorers.is_empty() {
            return Err(ProgressError::Validation(
                "pre_test_scorers and post_test_scorers must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// All configured units in order.
    pub fn units(&self) -> impl Iterator<Item = UnitId> {
        (1..=self.unit_count).map(UnitId)
    }

    /// The unit gated by the tutorial.
    pub fn entry_unit(&self) -> UnitId {
        UnitId(1)
    }

    /// The unit unlocked by passing `unit`'s post-test.
    pub fn next_unit(&self, unit: UnitId) -> Option<UnitId> {
        (unit.0 < self.unit_count).then(|| UnitId(unit.0 + 1))
    }

    /// Lessons held in a unit's lesson map, in play order (the post-test is separate).
    pub fn lesson_sequence(&self) -> Vec<LessonId> {
        std::iter::once(LessonId::PreTest)
            .chain((1..=self.lessons_per_unit).map(LessonId::Lesson))
            .collect()
    }

    /// The lesson unlocked when `lesson` completes.
    pub fn successor(&self, lesson: LessonId) -> Option<LessonId> {
        match lesson {
            LessonId::PreTest => Some(LessonId::Lesson(1)),
            LessonId::Lesson(n) if n < self.lessons_per_unit => Some(LessonId::Lesson(n + 1)),
            LessonId::Lesson(_) => Some(LessonId::PostTest),
            LessonId::PostTest => None,
        }
    }

    pub fn check_unit(&self, unit: UnitId) -> Result<()> {
        if unit.0 >= 1 && unit.0 <= self.unit_count {
            Ok(())
        } else {
            Err(ProgressError::NotFound(format!("Unknown unit '{}'", unit)))
        }
    }

    pub fn check_lesson(&self, unit: UnitId, lesson: LessonId) -> Result<()> {
        self.check_unit(unit)?;
        match lesson {
            LessonId::Lesson(n) if n > self.lessons_per_unit => Err(ProgressError::NotFound(
                format!("Unknown lesson '{}' in {}", lesson, unit),
            )),
            _ => Ok(()),
        }
    }

    /// Whether `checkpoint` is the authoritative score source for `lesson`.
    pub fn is_scorer(&self, lesson: LessonId, checkpoint: &str) -> bool {
        match lesson {
            LessonId::PreTest => self.pre_test_scorers.iter().any(|n| n == checkpoint),
            LessonId::PostTest => self.post_test_scorers.iter().any(|n| n == checkpoint),
            LessonId::Lesson(_) => false,
        }
    }

    /// Checkpoint written by explicit post-test results.
    pub fn post_test_checkpoint(&self) -> &str {
        self.post_test_scorers
            .first()
            .map(String::as_str)
            .unwrap_or("PrincipalPostTest")
    }
}
