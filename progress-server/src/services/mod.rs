//! Service layer for progress-server
//!
//! Services sit between HTTP handlers and the stores:
//! - Input validation
//! - Per-student serialization of progress merges
//! - Event emission after successful writes
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (validation, merge orchestration)
//!     ↓
//! Stores (store/*.rs)
//!     ↓
//! sled
//! ```

pub mod classroom_service;
pub mod events;
pub mod password;
pub mod progress_service;
pub mod response;
pub mod user_service;

// Re-exports
pub use classroom_service::{ClassroomService, CreateClassroomInput};
pub use events::{spawn_logging_listener, EventBus, EventListener, ProgressEvent, ResetScope};
pub use progress_service::{ProgressService, Updated};
pub use response::*;
pub use user_service::{CreateUserInput, LoginInput, UserService};

use progress_engine::Curriculum;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::store::{open_db, ClassroomStore, ProgressStore, SledProgressStore, UserStore};

/// Service container for dependency injection
///
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub progress: Arc<ProgressService>,
    pub users: Arc<UserService>,
    pub classrooms: Arc<ClassroomService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services over one sled database
    pub fn new(
        db: &sled::Db,
        curriculum: Curriculum,
        io_timeout: Duration,
    ) -> Result<Self> {
        let events = Arc::new(EventBus::new());
        let user_store = Arc::new(UserStore::open(db)?);
        let progress_store: Arc<dyn ProgressStore> = Arc::new(SledProgressStore::open(db)?);

        let progress = ProgressService::new(
            progress_store,
            Arc::new(curriculum),
            events.clone(),
            io_timeout,
        )
        .with_accounts(user_store.clone());

        Ok(Self {
            progress: Arc::new(progress),
            users: Arc::new(UserService::new(user_store, events.clone())),
            classrooms: Arc::new(ClassroomService::new(
                Arc::new(ClassroomStore::open(db)?),
                events.clone(),
            )),
            events,
        })
    }

    /// Open the database named by `config` and build services over it
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .curriculum
            .validate()
            .map_err(|e| ServerError::Config(format!("invalid curriculum: {}", e)))?;
        let db = open_db(config.db_path(), config.cache_size)?;
        Self::new(&db, config.curriculum.clone(), config.save_timeout())
    }
}
