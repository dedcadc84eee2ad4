//! Storage error taxonomy (spec.md §7 "Storage").
//!
//! Connection errors are recoverable; integrity and migration failures are
//! fatal for the offending operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage connection error: {0}")]
    Connection(String),

    #[error("storage query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("storage integrity violation: {0}")]
    Integrity(String),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("failed to create app data directory {0}: {1}")]
    Io(std::path::PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Whether the caller may retry the operation (spec.md §7).
    #[must_use]
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::Connection(_) | StorageError::Pool(_) | StorageError::Query(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
