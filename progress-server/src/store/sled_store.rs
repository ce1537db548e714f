//! Progress documents in a sled tree

use async_trait::async_trait;
use progress_engine::{ProgressDocument, Username};
use tracing::{debug, warn};

use super::{decode, encode, ProgressStore, StoredProgress};
use crate::error::{Result, ServerError};

/// Progress store backed by the `progress` sled tree
pub struct SledProgressStore {
    tree: sled::Tree,
}

impl SledProgressStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("progress")?;
        Ok(Self { tree })
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Run a sled call on the blocking pool so callers can bound it with a timeout.
async fn blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ServerError::Internal(format!("storage task failed: {}", e)))?
}

fn save_blocking(
    tree: &sled::Tree,
    username: &Username,
    document: ProgressDocument,
    expected_revision: Option<u64>,
) -> Result<u64> {
    let key = username.as_str().as_bytes();
    let previous = tree.get(key)?;

    let stored_revision = match previous {
        Some(ref bytes) => Some(decode::<StoredProgress>(bytes)?.revision),
        None => None,
    };
    if stored_revision != expected_revision {
        return Err(ServerError::Conflict(format!(
            "progress for '{}' is at revision {:?}, expected {:?}",
            username, stored_revision, expected_revision
        )));
    }

    let revision = expected_revision.map_or(1, |r| r + 1);
    let bytes = encode(&StoredProgress { revision, document })?;

    // A writer may have landed between the read and this swap
    match tree.compare_and_swap(key, previous, Some(bytes))? {
        Ok(()) => {
            debug!(username = %username, revision = revision, "Progress saved");
            Ok(revision)
        }
        Err(_) => {
            warn!(username = %username, "Concurrent progress write detected");
            Err(ServerError::Conflict(format!(
                "progress for '{}' changed during save",
                username
            )))
        }
    }
}

#[async_trait]
impl ProgressStore for SledProgressStore {
    async fn load(&self, username: &Username) -> Result<Option<StoredProgress>> {
        let tree = self.tree.clone();
        let username = username.clone();
        blocking(move || match tree.get(username.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        })
        .await
    }

    async fn save(
        &self,
        username: &Username,
        document: &ProgressDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64> {
        let tree = self.tree.clone();
        let username = username.clone();
        let document = document.clone();
        blocking(move || save_blocking(&tree, &username, document, expected_revision)).await
    }

    async fn delete(&self, username: &Username) -> Result<bool> {
        let tree = self.tree.clone();
        let username = username.clone();
        blocking(move || {
            let existed = tree.remove(username.as_str().as_bytes())?.is_some();
            if existed {
                debug!(username = %username, "Progress deleted");
            }
            Ok(existed)
        })
        .await
    }
}
