//! Backend/transport error taxonomy (spec.md §7 "Transport/backend").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("backend request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("model not found on backend: {0}")]
    ModelNotFound(String),

    #[error("backend generation failed: {0}")]
    GenerationFailed(String),

    #[error("context window exceeded")]
    ContextTooLong,

    #[error("backend binary not found on PATH or in default install locations")]
    BinaryNotFound,

    #[error("backend process exited before becoming ready (code {0:?})")]
    ProcessExited(Option<i32>),

    #[error("backend did not become ready within {0:?}")]
    StartupTimeout(std::time::Duration),

    #[error("failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackendError {
    /// Whether the caller may retry the operation (spec.md §7: all
    /// transport/backend errors are recoverable except `ModelNotFound` and
    /// `ContextTooLong`).
    #[must_use]
    pub fn recoverable(&self) -> bool {
        !matches!(self, BackendError::ModelNotFound(_) | BackendError::ContextTooLong)
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
