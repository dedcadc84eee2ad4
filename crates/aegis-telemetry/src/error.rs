//! Telemetry errors. Flush failures are logged, not propagated -- a dropped
//! batch would violate spec.md §8 ("every `recordMetric` call results in
//! either a future batch row or the pre-shutdown final flush. No silent
//! drops"), so callers never see this type on the hot path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
