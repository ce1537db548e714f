//! Persistence for progress documents, users and classrooms
//!
//! Progress documents carry a revision number. Every save names the revision
//! it was computed from, and the write only lands if the stored revision still
//! matches, so two merges computed from the same base cannot both succeed.
//!
//! ## Trees
//!
//! - `progress` - username -> [`StoredProgress`]
//! - `users` - username -> [`UserRecord`]
//! - `classrooms` - code -> [`ClassroomRecord`]

pub mod classrooms;
pub mod memory;
pub mod sled_store;
pub mod users;

pub use classrooms::{ClassroomRecord, ClassroomStore};
pub use memory::MemoryProgressStore;
pub use sled_store::SledProgressStore;
pub use users::{UserRecord, UserStore};

use async_trait::async_trait;
use progress_engine::{ProgressDocument, Username};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// A persisted progress document and its revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProgress {
    pub revision: u64,
    pub document: ProgressDocument,
}

/// Storage for per-student progress documents
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, username: &Username) -> Result<Option<StoredProgress>>;

    /// Write `document` if the stored revision equals `expected_revision`
    /// (`None`: no document stored yet). Returns the new revision.
    ///
    /// A mismatch fails with [`ServerError::Conflict`](crate::error::ServerError::Conflict)
    /// and writes nothing.
    async fn save(
        &self,
        username: &Username,
        document: &ProgressDocument,
        expected_revision: Option<u64>,
    ) -> Result<u64>;

    /// Returns whether a document existed.
    async fn delete(&self, username: &Username) -> Result<bool>;
}

/// Open the sled database backing all stores.
pub fn open_db(path: impl AsRef<Path>, cache_size: u64) -> Result<sled::Db> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = sled::Config::new()
        .path(path)
        .cache_capacity(cache_size)
        .mode(sled::Mode::HighThroughput)
        .open()?;

    info!(path = %path.display(), "Opened progress database");
    Ok(db)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub(crate) fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
