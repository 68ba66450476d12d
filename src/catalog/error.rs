use thiserror::Error;

use crate::version::error::VersionError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid version: {0}")]
    Version(#[from] VersionError),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Catalog integrity violation: {0}")]
    Integrity(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
