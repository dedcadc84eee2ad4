//! Bootstrap-time error taxonomy (spec.md §7). Per-request failures are the
//! `aegis_orchestrator::OrchestratorError`/`ErrorClassifier` pair's concern;
//! this type covers the failures that can only happen while assembling a
//! `Runtime` in the first place.

use aegis_types::{ErrorCategory, ErrorEnvelope};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] aegis_config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("backend error: {0}")]
    Backend(#[from] aegis_backend::BackendError),

    #[error("registry error: {0}")]
    Registry(#[from] aegis_registry::RegistryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn recoverable(&self) -> bool {
        match self {
            Error::Config(_) => false,
            Error::Storage(e) => e.recoverable(),
            Error::Backend(e) => e.recoverable(),
            Error::Registry(_) => true,
            Error::Other(_) => false,
        }
    }

    /// Maps this bootstrap failure into the boundary error envelope (spec.md
    /// §6), mirroring `aegis_orchestrator::ErrorClassifier`'s per-request
    /// mapping but without a telemetry side effect -- there is no
    /// `TelemetryCollector` yet while `Runtime::bootstrap` is still running.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let category = match self {
            Error::Config(_) => ErrorCategory::Bootstrap,
            Error::Storage(_) => ErrorCategory::Storage,
            Error::Backend(_) | Error::Registry(_) => ErrorCategory::Transport,
            Error::Other(_) => ErrorCategory::Bootstrap,
        };
        let suffix = match self {
            Error::Config(_) => "config_invalid",
            Error::Storage(_) => "storage_failure",
            Error::Backend(_) => "backend_unavailable",
            Error::Registry(_) => "model_unavailable",
            Error::Other(_) => "internal_error",
        };
        ErrorEnvelope::new(format!("{}.{suffix}", category.as_str()), self.to_string(), self.recoverable())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
