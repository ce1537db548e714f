//! Incoming partial progress updates.
//!
//! Map-shaped sections (`units`, `lessons`, `checkpoints`) are kept as ordered
//! entry lists so they are applied in the order the client sent them.

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointUpdate;
use crate::curriculum::{Curriculum, LessonId, UnitId};
use crate::error::{ProgressError, Result};
use crate::lesson::TestAttempt;
use crate::types::{LessonStatus, Reward};
use crate::username::Username;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressPatch {
    #[serde(rename = "Username", alias = "username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutorial: Option<TutorialPatch>,
    #[serde(with = "ordered_map", skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<(UnitId, UnitPatch)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_unit: Option<UnitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_lesson: Option<LessonId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TutorialPatch {
    #[serde(with = "ordered_map", skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<(String, CheckpointUpdate)>,
    /// NPCs the student finished talking to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_npcs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitPatch {
    #[serde(with = "ordered_map", skip_serializing_if = "Vec::is_empty")]
    pub lessons: Vec<(LessonId, LessonPatch)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_test: Option<PostTestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_score: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LessonStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(with = "ordered_map", skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<(String, CheckpointUpdate)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_npcs: Vec<String>,
}

impl LessonPatch {
    /// Whether the patch carries anything besides checkpoint data.
    pub fn touches_lesson_fields(&self) -> bool {
        self.status.is_some()
            || self.score.is_some()
            || self.total_questions.is_some()
            || self.score_display.is_some()
            || self.reward.is_some()
            || self.passed.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_lesson_fields() && self.checkpoints.is_empty() && self.completed_npcs.is_empty()
    }
}

/// Result of a unit's post-test, recorded authoritatively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTestResult {
    pub score: u32,
    pub total_questions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PostTestResult {
    pub fn attempt(&self) -> TestAttempt {
        TestAttempt {
            score: self.score,
            total_questions: self.total_questions,
            score_display: None,
            passed: self.passed,
            reward: self.reward,
        }
    }
}

impl ProgressPatch {
    /// Patch addressed to `username` with no other content.
    pub fn for_user(username: &Username) -> Self {
        Self {
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    /// Patch writing a single lesson checkpoint.
    pub fn checkpoint(
        username: &Username,
        unit: UnitId,
        lesson: LessonId,
        name: &str,
        update: CheckpointUpdate,
    ) -> Self {
        let lesson_patch = LessonPatch {
            checkpoints: vec![(name.to_string(), update)],
            ..Default::default()
        };
        Self {
            units: vec![(
                unit,
                UnitPatch {
                    lessons: vec![(lesson, lesson_patch)],
                    ..Default::default()
                },
            )],
            ..Self::for_user(username)
        }
    }

    /// Patch recording a post-test result.
    pub fn post_test(username: &Username, unit: UnitId, result: PostTestResult) -> Self {
        Self {
            units: vec![(
                unit,
                UnitPatch {
                    post_test: Some(result),
                    ..Default::default()
                },
            )],
            ..Self::for_user(username)
        }
    }

    /// The addressed student. Required on every patch.
    pub fn username(&self) -> Result<Username> {
        match self.username.as_deref() {
            Some(raw) => Username::parse(raw),
            None => Err(ProgressError::Validation("Username is required".into())),
        }
    }

    /// Check every referenced id against the curriculum before anything is applied.
    pub fn validate(&self, curriculum: &Curriculum) -> Result<()> {
        self.username()?;

        for (unit, unit_patch) in &self.units {
            curriculum.check_unit(*unit)?;
            for (lesson, _) in &unit_patch.lessons {
                curriculum.check_lesson(*unit, *lesson)?;
            }
            if let Some(ref result) = unit_patch.post_test {
                if result.score > result.total_questions {
                    return Err(ProgressError::Validation(format!(
                        "{} post-test score {} exceeds totalQuestions {}",
                        unit, result.score, result.total_questions
                    )));
                }
            }
        }

        if let Some(unit) = self.current_unit {
            curriculum.check_unit(unit)?;
        }
        if let Some(lesson) = self.current_lesson {
            let unit = self.current_unit.unwrap_or_else(|| curriculum.entry_unit());
            curriculum.check_lesson(unit, lesson)?;
        }
        Ok(())
    }
}

/// Serialize `Vec<(K, V)>` as a map and read a map back in document order.
pub(crate) mod ordered_map {
    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, K, V>(entries: &[(K, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<Vec<(K, V)>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de>,
        V: Deserialize<'de>,
    {
        struct EntriesVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for EntriesVisitor<K, V>
        where
            K: Deserialize<'de>,
            V: Deserialize<'de>,
        {
            type Value = Vec<(K, V)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_patch() {
        let json = r#"{
            "Username": "Student01",
            "tutorial": { "completedNpcs": ["Janica", "Mark"] },
            "units": {
                "Unit2": { "lessons": { "Lesson1": { "status": "InProgress" } } },
                "Unit1": {
                    "lessons": {
                        "PreTest": {
                            "checkpoints": { "Principal": { "score": 8, "totalQuestions": 10 } }
                        }
                    },
                    "postTest": { "score": 9, "totalQuestions": 10 }
                }
            }
        }"#;
        let patch: ProgressPatch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.username().unwrap().as_str(), "student01");
        // Document order is preserved
        assert_eq!(patch.units[0].0, UnitId::new(2));
        assert_eq!(patch.units[1].0, UnitId::new(1));
        let unit1 = &patch.units[1].1;
        assert_eq!(unit1.lessons[0].0, LessonId::PreTest);
        assert_eq!(unit1.lessons[0].1.checkpoints[0].1.score, Some(8));
        assert_eq!(unit1.post_test.as_ref().unwrap().score, 9);
    }

    #[test]
    fn test_lowercase_username_alias() {
        let patch: ProgressPatch = serde_json::from_str(r#"{"username":"x"}"#).unwrap();
        assert_eq!(patch.username().unwrap().as_str(), "x");
    }

    #[test]
    fn test_missing_username() {
        let patch = ProgressPatch::default();
        assert!(matches!(patch.username(), Err(ProgressError::Validation(_))));
    }

    #[test]
    fn test_malformed_ids_fail_to_parse() {
        let json = r#"{"Username":"x","units":{"Chapter1":{}}}"#;
        assert!(serde_json::from_str::<ProgressPatch>(json).is_err());
    }

    #[test]
    fn test_validate_unknown_ids() {
        let curriculum = Curriculum::default();
        let json = r#"{"Username":"x","units":{"Unit9":{}}}"#;
        let patch: ProgressPatch = serde_json::from_str(json).unwrap();
        assert!(matches!(patch.validate(&curriculum), Err(ProgressError::NotFound(_))));

        let json = r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson8":{}}}}}"#;
        let patch: ProgressPatch = serde_json::from_str(json).unwrap();
        assert!(matches!(patch.validate(&curriculum), Err(ProgressError::NotFound(_))));
    }

    #[test]
    fn test_patch_roundtrips_through_json() {
        let username = Username::parse("x").unwrap();
        let patch = ProgressPatch::checkpoint(
            &username,
            UnitId::new(1),
            LessonId::Lesson(2),
            "Annie",
            CheckpointUpdate::completed(),
        );
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["Username"], "x");
        assert_eq!(
            json["units"]["Unit1"]["lessons"]["Lesson2"]["checkpoints"]["Annie"]["status"],
            "Completed"
        );
        let back: ProgressPatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, patch);
    }
}
