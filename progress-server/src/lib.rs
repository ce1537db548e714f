//! Progress Server - HTTP backend for the questline learning game
//!
//! Stores one progress document per student and merges partial updates from
//! game clients into it with `progress_engine::merge`. Also keeps the account
//! and classroom records the game needs to log in and group students.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/questline-progress/
//! ├── progress.sled/         # sled database
//! │   ├── progress           # username -> {revision, document}
//! │   ├── users              # username -> account record
//! │   └── classrooms         # join code -> classroom record
//! └── config.toml            # Configuration and curriculum
//! ```
//!
//! Writes for one student are serialized in-process and guarded by a revision
//! check in the store, so concurrent updates never drop each other.

pub mod config;
pub mod error;
pub mod http;
pub mod services;
pub mod store;
pub mod views;

// Re-exports
pub use config::Config;
pub use error::{Result, ServerError};
pub use http::HttpServer;
pub use services::{EventBus, ProgressEvent, ProgressService, Services};
pub use store::{MemoryProgressStore, ProgressStore, SledProgressStore, StoredProgress};
