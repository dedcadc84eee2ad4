//! Registry error taxonomy.

use aegis_types::SlotName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model slot not configured: {0}")]
    SlotNotConfigured(SlotName),

    #[error("backend error loading slot {slot}: {source}")]
    Backend {
        slot: SlotName,
        #[source]
        source: aegis_backend::BackendError,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
