//! Progress service - load, merge, persist
//!
//! Every write runs as load -> merge -> conditional save while holding the
//! student's lock, so merges for one student are applied one at a time and a
//! merge computed from a stale base never overwrites a newer document.
//! Students are independent and proceed in parallel.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use progress_engine::{
    merge, reset_document, reset_lesson, reset_tutorial, CheckpointUpdate, Curriculum, LessonId,
    MergeOutcome, PostTestResult, ProgressDocument, ProgressPatch, Scope, Transition, UnitId,
    Username,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::events::{EventBus, ProgressEvent, ResetScope};
use crate::error::{Result, ServerError};
use crate::store::{ProgressStore, UserStore};
use crate::views::{CheckpointView, CompletedCheckpointsView, PostTestView, ProgressView};

/// A persisted merge result
#[derive(Debug, Clone)]
pub struct Updated {
    pub revision: u64,
    pub document: ProgressDocument,
    pub transitions: Vec<Transition>,
}

impl From<Updated> for ProgressView {
    fn from(updated: Updated) -> Self {
        ProgressView {
            revision: Some(updated.revision),
            document: updated.document,
        }
    }
}

/// Progress service for business logic
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
    curriculum: Arc<Curriculum>,
    events: Arc<EventBus>,
    /// Registered accounts; when set, reads for unknown students are NotFound
    accounts: Option<Arc<UserStore>>,
    locks: DashMap<Username, Arc<Mutex<()>>>,
    io_timeout: Duration,
}

impl ProgressService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        curriculum: Arc<Curriculum>,
        events: Arc<EventBus>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            store,
            curriculum,
            events,
            accounts: None,
            locks: DashMap::new(),
            io_timeout,
        }
    }

    /// Check reads against registered accounts.
    pub fn with_accounts(mut self, accounts: Arc<UserStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// The stored document, or the default one if the student has none yet.
    pub async fn get_progress(&self, username: &Username) -> Result<ProgressView> {
        match self.io("load", self.store.load(username)).await? {
            Some(stored) => Ok(ProgressView {
                revision: Some(stored.revision),
                document: stored.document,
            }),
            None => {
                self.ensure_account(username)?;
                Ok(ProgressView {
                    revision: None,
                    document: ProgressDocument::new(username.clone(), &self.curriculum),
                })
            }
        }
    }

    /// Completed checkpoint names in the tutorial (`unit` and `lesson` absent)
    /// or in one lesson.
    pub async fn get_completed_checkpoints(
        &self,
        username: &Username,
        unit: Option<UnitId>,
        lesson: Option<LessonId>,
    ) -> Result<CompletedCheckpointsView> {
        let scope = match (unit, lesson) {
            (None, None) => Scope::Tutorial,
            (Some(unit), Some(lesson)) => {
                self.curriculum.check_lesson(unit, lesson)?;
                Scope::Lesson { unit, lesson }
            }
            _ => {
                return Err(ServerError::Validation(
                    "unit and lesson must be given together".into(),
                ))
            }
        };

        let view = self.get_progress(username).await?;
        Ok(CompletedCheckpointsView {
            unit,
            lesson,
            completed: view.document.completed_checkpoints(scope)?,
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Merge a client patch into the student's document.
    pub async fn apply_progress_patch(&self, patch: &ProgressPatch) -> Result<Updated> {
        // Reject bad input before touching persistence
        patch.validate(&self.curriculum)?;
        let username = patch.username()?;

        let curriculum = self.curriculum.clone();
        self.update(&username, move |current, now| {
            Ok(merge(current, patch, &curriculum, now)?)
        })
        .await
    }

    /// Write one lesson checkpoint. The view carries the resulting `scoreDisplay`.
    pub async fn apply_checkpoint_update(
        &self,
        username: &Username,
        unit: UnitId,
        lesson: LessonId,
        name: &str,
        update: CheckpointUpdate,
    ) -> Result<CheckpointView> {
        if name.trim().is_empty() {
            return Err(ServerError::Validation("checkpoint name is required".into()));
        }
        let patch = ProgressPatch::checkpoint(username, unit, lesson, name, update);
        let updated = self.apply_progress_patch(&patch).await?;

        let stored = updated.document.lesson(unit, lesson)?;
        let checkpoint = stored.checkpoints.get(name).cloned().ok_or_else(|| {
            ServerError::Internal(format!("checkpoint '{}' missing after merge", name))
        })?;

        Ok(CheckpointView {
            unit,
            lesson,
            name: name.to_string(),
            score_display: checkpoint.score_display.clone(),
            checkpoint,
            lesson_status: stored.status,
        })
    }

    /// Record a post-test result for `unit`.
    pub async fn apply_post_test_result(
        &self,
        username: &Username,
        unit: UnitId,
        result: PostTestResult,
    ) -> Result<PostTestView> {
        let patch = ProgressPatch::post_test(username, unit, result);
        let updated = self.apply_progress_patch(&patch).await?;

        let document = &updated.document;
        let stored = document.unit(unit)?;
        let post_test = &stored.post_test;
        let unlocked_unit = self
            .curriculum
            .next_unit(unit)
            .filter(|_| post_test.passed == Some(true))
            .filter(|next| {
                document
                    .lesson(*next, LessonId::PreTest)
                    .is_ok_and(|pre| !pre.is_locked())
            });

        Ok(PostTestView {
            unit,
            status: post_test.status,
            score: post_test.score,
            total_questions: post_test.total_questions,
            score_display: post_test.score_display.clone(),
            passed: post_test.passed,
            reward: post_test.reward,
            unit_status: stored.status,
            unlocked_unit,
        })
    }

    pub async fn reset_tutorial(&self, username: &Username) -> Result<Updated> {
        let updated = self
            .update(username, |current, now| {
                let mut document = self.current_or_default(username, current);
                reset_tutorial(&mut document, now);
                Ok(unchanged_transitions(document))
            })
            .await?;
        self.emit_reset(username, ResetScope::Tutorial);
        Ok(updated)
    }

    pub async fn reset_lesson(
        &self,
        username: &Username,
        unit: UnitId,
        lesson: LessonId,
    ) -> Result<Updated> {
        self.curriculum.check_lesson(unit, lesson)?;
        let updated = self
            .update(username, |current, now| {
                let mut document = self.current_or_default(username, current);
                reset_lesson(&mut document, &self.curriculum, unit, lesson, now)?;
                Ok(unchanged_transitions(document))
            })
            .await?;
        self.emit_reset(username, ResetScope::Lesson { unit, lesson });
        Ok(updated)
    }

    /// Replace the document with a fresh default one. The revision keeps counting.
    pub async fn reset_whole_progress(&self, username: &Username) -> Result<Updated> {
        let updated = self
            .update(username, |_, now| {
                let mut document = reset_document(username.clone(), &self.curriculum);
                document.updated_at = Some(now);
                Ok(unchanged_transitions(document))
            })
            .await?;
        self.emit_reset(username, ResetScope::Document);
        Ok(updated)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run `apply` against the stored document under the student's lock and
    /// persist the result conditionally on the revision that was read.
    async fn update<F>(&self, username: &Username, apply: F) -> Result<Updated>
    where
        F: FnOnce(Option<ProgressDocument>, DateTime<Utc>) -> Result<MergeOutcome>,
    {
        let lock = self.lock_for(username);
        let result = {
            let _guard = lock.lock().await;
            self.update_locked(username, apply).await
        };
        drop(lock);
        self.release_lock(username);
        result
    }

    async fn update_locked<F>(&self, username: &Username, apply: F) -> Result<Updated>
    where
        F: FnOnce(Option<ProgressDocument>, DateTime<Utc>) -> Result<MergeOutcome>,
    {
        let stored = self.io("load", self.store.load(username)).await?;
        let (expected_revision, current) = match stored {
            Some(stored) => (Some(stored.revision), Some(stored.document)),
            None => (None, None),
        };

        let outcome = apply(current, Utc::now())?;

        let revision = self
            .io(
                "save",
                self.store.save(username, &outcome.document, expected_revision),
            )
            .await?;

        debug!(
            username = %username,
            revision = revision,
            transitions = outcome.transitions.len(),
            "Progress merged"
        );

        self.events.emit(ProgressEvent::ProgressSaved {
            username: username.clone(),
            revision,
        });
        for transition in &outcome.transitions {
            self.events
                .emit(ProgressEvent::from_transition(username, transition));
        }

        Ok(Updated {
            revision,
            document: outcome.document,
            transitions: outcome.transitions,
        })
    }

    fn lock_for(&self, username: &Username) -> Arc<Mutex<()>> {
        // Clone out of the map so no shard guard is held across an await
        self.locks.entry(username.clone()).or_default().clone()
    }

    /// Drop the student's lock entry once no request holds or waits on it.
    fn release_lock(&self, username: &Username) {
        // The map's own reference is the only one left when nobody is queued
        self.locks
            .remove_if(username, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Bound a persistence call. On timeout the request fails and emits no events.
    ///
    /// Fires only for stores that yield while waiting on storage. The sled store
    /// runs its calls on the blocking pool; a save it already started may still
    /// land after the timeout, and the client's retry merges to the same result.
    async fn io<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.io_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation = %operation, timeout = ?self.io_timeout, "Persistence call timed out");
                Err(ServerError::Timeout(format!(
                    "progress {} timed out after {:?}",
                    operation, self.io_timeout
                )))
            }
        }
    }

    fn ensure_account(&self, username: &Username) -> Result<()> {
        if let Some(ref accounts) = self.accounts {
            if !accounts.exists(username)? {
                return Err(ServerError::NotFound(format!("User '{}' not found", username)));
            }
        }
        Ok(())
    }

    fn current_or_default(
        &self,
        username: &Username,
        current: Option<ProgressDocument>,
    ) -> ProgressDocument {
        current.unwrap_or_else(|| ProgressDocument::new(username.clone(), &self.curriculum))
    }

    fn emit_reset(&self, username: &Username, scope: ResetScope) {
        info!(username = %username, scope = ?scope, "Progress reset");
        self.events.emit(ProgressEvent::ProgressReset {
            username: username.clone(),
            scope,
        });
    }
}

fn unchanged_transitions(document: ProgressDocument) -> MergeOutcome {
    MergeOutcome {
        document,
        transitions: Vec::new(),
    }
}
