//! Personality subsystem errors. Storage failures here fold into the
//! memory error taxonomy at the orchestrator boundary (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersonalityError {
    #[error("personality storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("fragment not found: {0}")]
    NotFound(String),

    #[error("inference LLM error: {0}")]
    Inference(#[from] aegis_backend::BackendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PersonalityError>;
