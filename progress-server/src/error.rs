//! Error types for progress-server

use progress_engine::ProgressError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// A uniquely keyed record already exists.
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Conditional write lost against a concurrent writer. Safe to retry.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether the caller may resend the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServerError::Conflict(_) | ServerError::Timeout(_) | ServerError::Database(_)
        )
    }
}

impl From<ProgressError> for ServerError {
    fn from(error: ProgressError) -> Self {
        match error {
            ProgressError::Validation(msg) => ServerError::Validation(msg),
            ProgressError::NotFound(msg) => ServerError::NotFound(msg),
        }
    }
}

impl From<rmp_serde::encode::Error> for ServerError {
    fn from(error: rmp_serde::encode::Error) -> Self {
        ServerError::Serialization(error.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ServerError {
    fn from(error: rmp_serde::decode::Error) -> Self {
        ServerError::Serialization(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
