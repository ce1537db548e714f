//! Unit state: an ordered lesson map, the post-test, and derived aggregates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::curriculum::{Curriculum, LessonId};
use crate::lesson::{Lesson, ScoreSummary};
use crate::types::UnitStatus;

/// Unit-level mirrors of the pre-test and post-test scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_test: Option<ScoreSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_test: Option<ScoreSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub status: UnitStatus,
    pub completed_lessons: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_score: Option<u32>,
    pub lessons: BTreeMap<LessonId, Lesson>,
    pub post_test: Lesson,
    #[serde(default)]
    pub scores: TestScores,
}

impl Unit {
    /// A fresh unit. The entry unit opens on its first ordinary lesson;
    /// every other unit starts fully locked.
    pub fn new(curriculum: &Curriculum, entry: bool) -> Self {
        let lessons = curriculum
            .lesson_sequence()
            .into_iter()
            .map(|id| {
                let lesson = if entry && id == LessonId::Lesson(1) {
                    Lesson::available()
                } else {
                    Lesson::locked()
                };
                (id, lesson)
            })
            .collect();

        let mut unit = Self {
            status: UnitStatus::NotStarted,
            completed_lessons: 0,
            unit_score: None,
            lessons,
            post_test: Lesson::locked(),
            scores: TestScores::default(),
        };
        unit.recompute();
        unit
    }

    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        match id {
            LessonId::PostTest => Some(&self.post_test),
            _ => self.lessons.get(&id),
        }
    }

    pub fn lesson_mut(&mut self, id: LessonId) -> Option<&mut Lesson> {
        match id {
            LessonId::PostTest => Some(&mut self.post_test),
            _ => self.lessons.get_mut(&id),
        }
    }

    /// Lessons counted toward `completedLessons` (the post-test is not one of them).
    pub fn total_lessons(&self) -> u32 {
        self.lessons.len() as u32
    }

    /// Re-derive `completedLessons` and `status` from lesson state.
    ///
    /// A recorded post-test closes the unit regardless of lesson coverage.
    pub fn recompute(&mut self) {
        self.completed_lessons = self.lessons.values().filter(|l| l.is_completed()).count() as u32;
        let total = self.total_lessons();

        self.status = if self.post_test.is_completed()
            || (total > 0 && self.completed_lessons == total)
        {
            UnitStatus::Completed
        } else if self.completed_lessons > 0 {
            UnitStatus::InProgress
        } else {
            UnitStatus::NotStarted
        };
    }

    /// Copy a test's lesson-level score onto the unit mirror.
    pub fn mirror_scores(&mut self, id: LessonId) {
        match id {
            LessonId::PreTest => {
                self.scores.pre_test = self.lessons.get(&id).map(Lesson::summary);
            }
            LessonId::PostTest => {
                self.scores.post_test = Some(self.post_test.summary());
            }
            LessonId::Lesson(_) => {}
        }
    }

    /// Drop the mirror for a test that was reset.
    pub fn clear_mirror(&mut self, id: LessonId) {
        match id {
            LessonId::PreTest => self.scores.pre_test = None,
            LessonId::PostTest => {
                self.scores.post_test = None;
                self.unit_score = None;
            }
            LessonId::Lesson(_) => {}
        }
    }

    /// First lesson (post-test last) that is open, else the first not yet completed.
    pub fn current_lesson(&self) -> Option<LessonId> {
        let ordered = || {
            self.lessons
                .iter()
                .map(|(id, l)| (*id, l))
                .chain(std::iter::once((LessonId::PostTest, &self.post_test)))
        };
        ordered()
            .find(|(_, l)| !l.is_locked() && !l.is_completed())
            .or_else(|| ordered().find(|(_, l)| !l.is_completed()))
            .map(|(id, _)| id)
    }
}
