//! Orchestrator error taxonomy (spec.md §7). Most subsystem failures are
//! caught and degrade a single pipeline stage rather than propagating here;
//! this type exists for the failures that must end the request outright
//! (generation failure, storage errors surfaced during bootstrap-adjacent
//! calls).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("backend error: {0}")]
    Backend(#[from] aegis_backend::BackendError),

    #[error("registry error: {0}")]
    Registry(#[from] aegis_registry::RegistryError),

    #[error("memory error: {0}")]
    Memory(#[from] aegis_memory::MemoryError),

    #[error("personality error: {0}")]
    Personality(#[from] aegis_personality::PersonalityError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] aegis_telemetry::TelemetryError),

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Whether the caller may retry the request (spec.md §6 envelope).
    #[must_use]
    pub fn recoverable(&self) -> bool {
        match self {
            OrchestratorError::Storage(e) => e.recoverable(),
            OrchestratorError::Backend(e) => e.recoverable(),
            OrchestratorError::Registry(_) => true,
            OrchestratorError::Memory(e) => e.recoverable(),
            OrchestratorError::Personality(_) => true,
            OrchestratorError::Telemetry(_) => true,
            OrchestratorError::Cancelled => false,
            OrchestratorError::Other(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
