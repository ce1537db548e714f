//! Error types for the progress engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    /// The patch or request is malformed and must be fixed before resending.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unit, lesson or document outside the configured curriculum was referenced.
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ProgressError>;
