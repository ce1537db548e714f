//! Merge engine: fold a partial update into a progress document.
//!
//! ## Application order
//!
//! 1. Tutorial checkpoints, then the tutorial status. A completed tutorial
//!    unlocks the entry unit's pre-test.
//! 2. Units in patch order; within a unit, lessons in patch order, then the
//!    unit score, then an explicit post-test result.
//! 3. Lesson updates that hit a Locked lesson keep their checkpoint data but
//!    are retried once the rest of the patch has been applied, until nothing
//!    more unlocks.
//! 4. Unit aggregates and the current unit/lesson pointers are re-derived.
//!
//! Unlocks are "Locked -> Available" and checkpoint writes are overwrites, so
//! applying the same patch twice with the same clock yields the same document.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::checkpoint::CheckpointUpdate;
use crate::curriculum::{Curriculum, LessonId, UnitId};
use crate::document::ProgressDocument;
use crate::error::{ProgressError, Result};
use crate::lesson::TestAttempt;
use crate::patch::{LessonPatch, PostTestResult, ProgressPatch, TutorialPatch};
use crate::types::{CheckpointStatus, LessonStatus, UnitStatus};

/// Observable state changes produced by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    TutorialCompleted,
    LessonUnlocked { unit: UnitId, lesson: LessonId },
    LessonCompleted { unit: UnitId, lesson: LessonId },
    UnitCompleted { unit: UnitId },
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: ProgressDocument,
    pub transitions: Vec<Transition>,
}

/// Merge `patch` into `current`, synthesizing a default document when there is none.
///
/// Every referenced id is validated first; on error nothing is applied.
pub fn merge(
    current: Option<ProgressDocument>,
    patch: &ProgressPatch,
    curriculum: &Curriculum,
    now: DateTime<Utc>,
) -> Result<MergeOutcome> {
    patch.validate(curriculum)?;
    let username = patch.username()?;

    let document = match current {
        Some(document) if document.username != username => {
            return Err(ProgressError::Validation(format!(
                "Patch for '{}' cannot be applied to the document of '{}'",
                username, document.username
            )));
        }
        Some(document) => document,
        None => {
            debug!(username = %username, "Synthesizing default progress document");
            ProgressDocument::new(username, curriculum)
        }
    };

    Ok(Merger::new(curriculum, now).run(document, patch))
}

struct Merger<'a> {
    curriculum: &'a Curriculum,
    now: DateTime<Utc>,
    transitions: Vec<Transition>,
}

impl<'a> Merger<'a> {
    fn new(curriculum: &'a Curriculum, now: DateTime<Utc>) -> Self {
        Self {
            curriculum,
            now,
            transitions: Vec::new(),
        }
    }

    fn run(mut self, mut document: ProgressDocument, patch: &ProgressPatch) -> MergeOutcome {
        document.ensure_units(self.curriculum);
        document.recompute_units();
        let statuses_before: Vec<(UnitId, UnitStatus)> =
            document.units.iter().map(|(id, u)| (*id, u.status)).collect();

        if let Some(ref tutorial) = patch.tutorial {
            self.apply_tutorial(&mut document, tutorial);
        }
        if document.tutorial.is_completed() {
            self.unlock(&mut document, self.curriculum.entry_unit(), LessonId::PreTest);
        }

        let mut deferred: Vec<(UnitId, LessonId, &LessonPatch)> = Vec::new();
        for (unit_id, unit_patch) in &patch.units {
            for (lesson_id, lesson_patch) in &unit_patch.lessons {
                if !self.apply_lesson(&mut document, *unit_id, *lesson_id, lesson_patch) {
                    deferred.push((*unit_id, *lesson_id, lesson_patch));
                }
            }
            if let Some(score) = unit_patch.unit_score {
                if let Some(unit) = document.units.get_mut(unit_id) {
                    unit.unit_score = Some(score);
                }
            }
            if let Some(ref result) = unit_patch.post_test {
                self.apply_post_test(&mut document, *unit_id, result);
            }
        }

        // Retry updates blocked by a lock until a pass unlocks nothing new
        while !deferred.is_empty() {
            let before = deferred.len();
            deferred.retain(|(unit, lesson, lesson_patch)| {
                !self.apply_lesson(&mut document, *unit, *lesson, lesson_patch)
            });
            if deferred.len() == before {
                break;
            }
        }
        for (unit, lesson, _) in &deferred {
            debug!(unit = %unit, lesson = %lesson, "Lesson still locked, status update ignored");
        }

        document.recompute_units();
        for (id, before) in statuses_before {
            let after = document.units.get(&id).map(|u| u.status);
            if before != UnitStatus::Completed && after == Some(UnitStatus::Completed) {
                self.transitions.push(Transition::UnitCompleted { unit: id });
            }
        }

        document.derive_pointers();
        if patch.current_unit.is_some() || patch.current_lesson.is_some() {
            if !document.override_pointers(patch.current_unit, patch.current_lesson) {
                debug!("Pointer override names a locked lesson, keeping derived pointers");
            }
        }
        document.updated_at = Some(self.now);

        MergeOutcome {
            document,
            transitions: self.transitions,
        }
    }

    fn apply_tutorial(&mut self, document: &mut ProgressDocument, patch: &TutorialPatch) {
        let required = &self.curriculum.tutorial_npcs;
        let completed = CheckpointUpdate::completed();
        let updates = patch
            .checkpoints
            .iter()
            .map(|(name, update)| (name.as_str(), update))
            .chain(patch.completed_npcs.iter().map(|npc| (npc.as_str(), &completed)));

        for (npc, update) in updates {
            trace!(npc = %npc, "Tutorial checkpoint");
            if document.tutorial.apply_checkpoint(npc, update, required, self.now) {
                debug!(username = %document.username, "Tutorial completed");
                self.transitions.push(Transition::TutorialCompleted);
            }
        }
    }

    /// Apply one lesson update. Returns false if the lesson is Locked and the
    /// update must be retried after something unlocks it.
    fn apply_lesson(
        &mut self,
        document: &mut ProgressDocument,
        unit_id: UnitId,
        lesson_id: LessonId,
        patch: &LessonPatch,
    ) -> bool {
        let now = self.now;
        let curriculum = self.curriculum;
        let Some(unit) = document.units.get_mut(&unit_id) else {
            return true;
        };
        let Some(lesson) = unit.lesson_mut(lesson_id) else {
            return true;
        };

        let completed = CheckpointUpdate::completed();
        let mut scorer: Option<&CheckpointUpdate> = None;
        let mut scorer_name: Option<&str> = None;
        for (name, update) in &patch.checkpoints {
            lesson.checkpoints.upsert(name, update, now);
            if curriculum.is_scorer(lesson_id, name) {
                scorer = Some(update);
                scorer_name = Some(name.as_str());
            }
        }
        for npc in &patch.completed_npcs {
            lesson.checkpoints.upsert(npc, &completed, now);
        }

        if patch.is_empty() {
            return true;
        }
        if lesson.is_locked() {
            return false;
        }
        lesson.last_attempt = Some(now);

        // The scorer checkpoint is the authoritative score source for tests,
        // but only when this update carries score data
        let scorer_scored = scorer.is_some_and(|u| {
            u.score.is_some() || u.total_questions.is_some() || u.score_display.is_some()
        });
        let scored_attempt = scorer_name
            .filter(|_| scorer_scored)
            .and_then(|name| lesson.checkpoints.get(name))
            .and_then(|cp| match (cp.score, cp.total_questions) {
                (Some(score), Some(total)) => Some(TestAttempt {
                    score,
                    total_questions: total,
                    score_display: cp.score_display.clone(),
                    passed: patch.passed,
                    reward: scorer.and_then(|u| u.reward).or(patch.reward),
                }),
                _ => None,
            });

        let mut target = patch.status;
        if let Some(ref attempt) = scored_attempt {
            lesson.record_test(attempt);
            target = Some(LessonStatus::Completed);
        } else if let Some(score) = patch.score {
            if lesson_id.is_test() {
                let attempt = TestAttempt {
                    score,
                    total_questions: patch.total_questions.or(lesson.total_questions).unwrap_or(score),
                    score_display: patch.score_display.clone(),
                    passed: patch.passed,
                    reward: patch.reward,
                };
                lesson.record_test(&attempt);
            } else {
                lesson.record_score(score, patch.total_questions, patch.score_display.clone());
            }
        } else if let Some(passed) = patch.passed {
            if lesson_id.is_test() {
                lesson.passed = Some(passed);
            }
        }
        if scored_attempt.is_none() {
            if let Some(reward) = patch.reward {
                lesson.reward = Some(reward);
            }
        }

        let target = target.unwrap_or(LessonStatus::InProgress);
        if lesson.advance(target) && lesson.is_completed() {
            trace!(unit = %unit_id, lesson = %lesson_id, "Lesson completed");
            self.transitions.push(Transition::LessonCompleted {
                unit: unit_id,
                lesson: lesson_id,
            });
        }

        if scored_attempt.is_some() || (lesson_id.is_test() && patch.score.is_some()) {
            unit.mirror_scores(lesson_id);
        }

        self.settle_unit(document, unit_id);
        true
    }

    /// Record an explicit post-test result. Bypasses the lock: the game only
    /// reports a post-test score once the student has taken it.
    fn apply_post_test(
        &mut self,
        document: &mut ProgressDocument,
        unit_id: UnitId,
        result: &PostTestResult,
    ) {
        let now = self.now;
        let checkpoint_name = self.curriculum.post_test_checkpoint().to_string();
        let Some(unit) = document.units.get_mut(&unit_id) else {
            return;
        };

        let attempt = result.attempt();
        let checkpoint = CheckpointUpdate {
            status: Some(CheckpointStatus::Completed),
            reward: Some(attempt.reward()),
            date: None,
            message: result.message.clone(),
            score: Some(attempt.score),
            total_questions: Some(attempt.total_questions),
            score_display: Some(attempt.display()),
        };

        // Score and checkpoint first so the unlock below sees this attempt
        let post_test = &mut unit.post_test;
        post_test.checkpoints.upsert(&checkpoint_name, &checkpoint, now);
        post_test.record_test(&attempt);
        post_test.last_attempt = Some(now);
        if post_test.advance(LessonStatus::Completed) {
            self.transitions.push(Transition::LessonCompleted {
                unit: unit_id,
                lesson: LessonId::PostTest,
            });
        }
        unit.mirror_scores(LessonId::PostTest);
        unit.unit_score = Some(attempt.score);
        unit.recompute();

        debug!(
            unit = %unit_id,
            score = attempt.score,
            total = attempt.total_questions,
            passed = attempt.passed(),
            "Post-test recorded"
        );

        self.settle_unit(document, unit_id);
    }

    /// Unlock whatever the unit's completed lessons give access to.
    fn settle_unit(&mut self, document: &mut ProgressDocument, unit_id: UnitId) {
        let Some(unit) = document.units.get(&unit_id) else {
            return;
        };

        let mut unlocks: Vec<(UnitId, LessonId)> = unit
            .lessons
            .iter()
            .filter(|(_, lesson)| lesson.is_completed())
            .filter_map(|(id, _)| self.curriculum.successor(*id))
            .map(|next| (unit_id, next))
            .collect();

        if unit.post_test.is_completed() && unit.post_test.passed == Some(true) {
            if let Some(next_unit) = self.curriculum.next_unit(unit_id) {
                unlocks.push((next_unit, LessonId::PreTest));
            }
        }

        for (unit, lesson) in unlocks {
            self.unlock(document, unit, lesson);
        }
    }

    fn unlock(&mut self, document: &mut ProgressDocument, unit_id: UnitId, lesson_id: LessonId) {
        let unlocked = document
            .units
            .get_mut(&unit_id)
            .and_then(|unit| unit.lesson_mut(lesson_id))
            .is_some_and(|lesson| lesson.unlock());

        if unlocked {
            debug!(unit = %unit_id, lesson = %lesson_id, "Lesson unlocked");
            self.transitions.push(Transition::LessonUnlocked {
                unit: unit_id,
                lesson: lesson_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::username::Username;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 8, 30, 0).unwrap()
    }

    fn patch(json: &str) -> ProgressPatch {
        serde_json::from_str(json).unwrap()
    }

    fn default_doc() -> ProgressDocument {
        ProgressDocument::new(Username::parse("x").unwrap(), &Curriculum::default())
    }

    #[test]
    fn test_locked_lesson_defers_status() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson3":{"status":"Completed"}}}}}"#);
        let outcome = merge(None, &p, &curriculum, now()).unwrap();
        let lesson = outcome.document.lesson(UnitId::new(1), LessonId::Lesson(3)).unwrap();
        assert!(lesson.is_locked());
        assert!(outcome.transitions.is_empty());
    }

    #[test]
    fn test_sequential_unlock() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson1":{"status":"Completed"}}}}}"#);
        let outcome = merge(None, &p, &curriculum, now()).unwrap();
        let doc = &outcome.document;
        assert!(doc.lesson(UnitId::new(1), LessonId::Lesson(1)).unwrap().is_completed());
        assert_eq!(
            doc.lesson(UnitId::new(1), LessonId::Lesson(2)).unwrap().status,
            LessonStatus::Available
        );
        assert_eq!(doc.units[&UnitId::new(1)].completed_lessons, 1);
        assert_eq!(doc.units[&UnitId::new(1)].status, UnitStatus::InProgress);
        assert_eq!(doc.current_lesson, Some(LessonId::Lesson(2)));
        assert!(outcome.transitions.contains(&Transition::LessonUnlocked {
            unit: UnitId::new(1),
            lesson: LessonId::Lesson(2)
        }));
    }

    #[test]
    fn test_out_of_order_patch_reaches_fixpoint() {
        let curriculum = Curriculum::default();
        // Lesson2 listed before the Lesson1 completion that unlocks it
        let p = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{
                "Lesson2":{"status":"Completed"},
                "Lesson1":{"status":"Completed"}
            }}}}"#,
        );
        let doc = merge(None, &p, &curriculum, now()).unwrap().document;
        assert!(doc.lesson(UnitId::new(1), LessonId::Lesson(2)).unwrap().is_completed());
        assert_eq!(
            doc.lesson(UnitId::new(1), LessonId::Lesson(3)).unwrap().status,
            LessonStatus::Available
        );
    }

    #[test]
    fn test_checkpoint_activity_marks_in_progress() {
        let curriculum = Curriculum::default();
        let p = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson1":{"completedNpcs":["Mark"]}}}}}"#,
        );
        let doc = merge(None, &p, &curriculum, now()).unwrap().document;
        let lesson = doc.lesson(UnitId::new(1), LessonId::Lesson(1)).unwrap();
        assert_eq!(lesson.status, LessonStatus::InProgress);
        assert!(lesson.checkpoints.get("Mark").unwrap().is_completed());
        assert_eq!(lesson.last_attempt, Some(now()));
    }

    #[test]
    fn test_pre_test_scorer_completes_and_mirrors() {
        let curriculum = Curriculum::default();
        let mut doc = default_doc();
        doc.unit_mut(UnitId::new(1))
            .unwrap()
            .lesson_mut(LessonId::PreTest)
            .unwrap()
            .unlock();

        let p = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"PreTest":{
                "checkpoints":{"Principal":{"status":"Completed","score":3,"totalQuestions":10}}
            }}}}}"#,
        );
        let doc = merge(Some(doc), &p, &curriculum, now()).unwrap().document;
        let unit = &doc.units[&UnitId::new(1)];
        let pre = &unit.lessons[&LessonId::PreTest];
        assert!(pre.is_completed());
        assert_eq!(pre.score, Some(3));
        assert_eq!(pre.score_display.as_deref(), Some("3/10"));
        assert_eq!(pre.passed, Some(false));
        assert_eq!(pre.reward, Some(crate::types::Reward::TwoStar));
        let mirror = unit.scores.pre_test.as_ref().unwrap();
        assert_eq!(mirror.score, Some(3));
        assert_eq!(mirror.passed, Some(false));
    }

    #[test]
    fn test_explicit_passed_flag_wins() {
        let curriculum = Curriculum::default();
        let mut doc = default_doc();
        doc.unit_mut(UnitId::new(1))
            .unwrap()
            .lesson_mut(LessonId::PreTest)
            .unwrap()
            .unlock();
        let p = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"PreTest":{
                "passed": true,
                "checkpoints":{"Principal":{"score":1,"totalQuestions":10}}
            }}}}}"#,
        );
        let doc = merge(Some(doc), &p, &curriculum, now()).unwrap().document;
        let pre = doc.lesson(UnitId::new(1), LessonId::PreTest).unwrap();
        assert_eq!(pre.passed, Some(true));
        assert_eq!(pre.reward, Some(crate::types::Reward::FiveStar));
    }

    #[test]
    fn test_scorer_message_keeps_explicit_result() {
        let curriculum = Curriculum::default();
        let mut doc = default_doc();
        doc.unit_mut(UnitId::new(1))
            .unwrap()
            .lesson_mut(LessonId::PreTest)
            .unwrap()
            .unlock();
        let scored = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"PreTest":{
                "passed": true,
                "checkpoints":{"Principal":{"status":"Completed","score":1,"totalQuestions":10}}
            }}}}}"#,
        );
        let doc = merge(Some(doc), &scored, &curriculum, now()).unwrap().document;

        let touch = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"PreTest":{
                "checkpoints":{"Principal":{"message":"thanks"}}
            }}}}}"#,
        );
        let doc = merge(Some(doc), &touch, &curriculum, now()).unwrap().document;

        let pre = doc.lesson(UnitId::new(1), LessonId::PreTest).unwrap();
        assert_eq!(pre.passed, Some(true));
        assert_eq!(pre.reward, Some(crate::types::Reward::FiveStar));
        assert_eq!(pre.score_display.as_deref(), Some("1/10"));
        assert_eq!(pre.checkpoints.get("Principal").unwrap().message, "thanks");
        let mirror = doc.units[&UnitId::new(1)].scores.pre_test.as_ref().unwrap();
        assert_eq!(mirror.passed, Some(true));
    }

    #[test]
    fn test_post_test_checkpoint_touch_keeps_recorded_result() {
        let curriculum = Curriculum::default();
        let recorded = patch(
            r#"{"Username":"x","units":{"Unit1":{"postTest":{"score":3,"totalQuestions":10,"passed":true}}}}"#,
        );
        let doc = merge(None, &recorded, &curriculum, now()).unwrap().document;

        let touch = patch(
            r#"{"Username":"x","units":{"Unit1":{"lessons":{"PostTest":{
                "checkpoints":{"PrincipalPostTest":{"message":"see you next unit"}}
            }}}}}"#,
        );
        let doc = merge(Some(doc), &touch, &curriculum, now()).unwrap().document;

        let post = &doc.units[&UnitId::new(1)].post_test;
        assert_eq!(post.passed, Some(true));
        assert_eq!(post.status, LessonStatus::Completed);
        assert!(!doc.lesson(UnitId::new(2), LessonId::PreTest).unwrap().is_locked());
    }

    #[test]
    fn test_failed_post_test_does_not_unlock_next_unit() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit1":{"postTest":{"score":2,"totalQuestions":10}}}}"#);
        let doc = merge(None, &p, &curriculum, now()).unwrap().document;
        assert_eq!(doc.units[&UnitId::new(1)].status, UnitStatus::Completed);
        assert_eq!(doc.units[&UnitId::new(1)].post_test.passed, Some(false));
        assert!(doc.lesson(UnitId::new(2), LessonId::PreTest).unwrap().is_locked());
    }

    #[test]
    fn test_last_unit_post_test_has_no_successor() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit4":{"postTest":{"score":10,"totalQuestions":10}}}}"#);
        let outcome = merge(None, &p, &curriculum, now()).unwrap();
        assert!(outcome
            .transitions
            .contains(&Transition::UnitCompleted { unit: UnitId::new(4) }));
    }

    #[test]
    fn test_unknown_unit_rejected_without_changes() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson1":{"status":"Completed"}}},"Unit7":{}}}"#);
        let err = merge(Some(default_doc()), &p, &curriculum, now()).unwrap_err();
        assert!(matches!(err, ProgressError::NotFound(_)));
    }

    #[test]
    fn test_username_mismatch_rejected() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"someone-else"}"#);
        assert!(matches!(
            merge(Some(default_doc()), &p, &curriculum, now()),
            Err(ProgressError::Validation(_))
        ));
    }

    #[test]
    fn test_pointer_override() {
        let curriculum = Curriculum::default();
        let first = patch(r#"{"Username":"x","units":{"Unit1":{"lessons":{"Lesson1":{"status":"Completed"}}}}}"#);
        let doc = merge(None, &first, &curriculum, now()).unwrap().document;

        let back = patch(r#"{"Username":"x","currentUnit":"Unit1","currentLesson":"Lesson1"}"#);
        let doc = merge(Some(doc), &back, &curriculum, now()).unwrap().document;
        assert_eq!(doc.current_lesson, Some(LessonId::Lesson(1)));

        let locked = patch(r#"{"Username":"x","currentUnit":"Unit3","currentLesson":"Lesson4"}"#);
        let doc = merge(Some(doc), &locked, &curriculum, now()).unwrap().document;
        assert_eq!(doc.current_unit, Some(UnitId::new(1)));
        assert_eq!(doc.current_lesson, Some(LessonId::Lesson(2)));
    }

    #[test]
    fn test_unit_score_last_write() {
        let curriculum = Curriculum::default();
        let p = patch(r#"{"Username":"x","units":{"Unit2":{"unitScore":42}}}"#);
        let doc = merge(None, &p, &curriculum, now()).unwrap().document;
        assert_eq!(doc.units[&UnitId::new(2)].unit_score, Some(42));
    }
}
