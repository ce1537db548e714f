//! In-memory progress store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use progress_engine::{ProgressDocument, Username};

use super::{ProgressStore, StoredProgress};
use crate::error::{Result, ServerError};

/// Progress store held in a `DashMap`. Same revision rules as the sled store.
#[derive(Default)]
pub struct MemoryProgressStore {
    documents: DashMap<Username, StoredProgress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict(username: &Username, stored: Option<u64>, expected: Option<u64>) -> ServerError {
    ServerError::Conflict(format!(
        "progress for '{}' is at revision {:?}, expected {:?}",
        username, stored, expected
    ))
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self, username: &Username) -> Result<Option<StoredProgress>> {
        Ok(self.documents.get(username).map(|entry| entry.value().clone()))
    }

    async fn save(
        &self,
        username: &Username,
        document: &ProgressDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64> {
        match self.documents.entry(username.clone()) {
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get().revision;
                if expected_revision != Some(stored) {
                    return Err(conflict(username, Some(stored), expected_revision));
                }
                let revision = stored + 1;
                occupied.insert(StoredProgress {
                    revision,
                    document: document.clone(),
                });
                Ok(revision)
            }
            Entry::Vacant(vacant) => {
                if expected_revision.is_some() {
                    return Err(conflict(username, None, expected_revision));
                }
                vacant.insert(StoredProgress {
                    revision: 1,
                    document: document.clone(),
                });
                Ok(1)
            }
        }
    }

    async fn delete(&self, username: &Username) -> Result<bool> {
        Ok(self.documents.remove(username).is_some())
    }
}
