//! Memory error taxonomy (spec.md §7 "Memory").
//!
//! All variants are recoverable: callers continue with degraded (empty)
//! memory context rather than failing the request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("memory retrieval error: {0}")]
    Retrieval(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] aegis_backend::BackendError),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MemoryError {
    /// All memory errors are recoverable (spec.md §7).
    #[must_use]
    pub fn recoverable(&self) -> bool {
        true
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
