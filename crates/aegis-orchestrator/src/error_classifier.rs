//! `ErrorClassifier`: maps any subsystem error into the boundary
//! `ErrorEnvelope` and fires the matching `errors.<category>.total` counter
//! (spec.md §6 "Error envelope", SPEC_FULL.md §4.10; grounded on
//! `original_source/src/core/error_handler.py`'s category dispatch table).

use crate::error::OrchestratorError;
use aegis_telemetry::{MetricKind, TelemetryCollector};
use aegis_types::{ErrorCategory, ErrorEnvelope};
use std::collections::HashMap;
use std::sync::Arc;

/// Pure classification plus a telemetry side effect, kept as one call so no
/// caller can classify an error without also accounting for it (spec.md §7:
/// "every propagated error is both enveloped and counted").
pub struct ErrorClassifier {
    telemetry: Arc<TelemetryCollector>,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(telemetry: Arc<TelemetryCollector>) -> Self {
        Self { telemetry }
    }

    #[must_use]
    pub fn classify(&self, error: &OrchestratorError) -> ErrorEnvelope {
        let category = categorize(error);
        let envelope = ErrorEnvelope::new(code_for(error, category), error.to_string(), error.recoverable());

        self.telemetry.record_metric(
            &format!("errors.{}.total", category.as_str()),
            1.0,
            HashMap::new(),
            MetricKind::Counter,
        );

        envelope
    }
}

fn categorize(error: &OrchestratorError) -> ErrorCategory {
    match error {
        OrchestratorError::Backend(_) | OrchestratorError::Registry(_) => ErrorCategory::Transport,
        OrchestratorError::Memory(_) | OrchestratorError::Personality(_) => ErrorCategory::Memory,
        OrchestratorError::Storage(_) | OrchestratorError::Telemetry(_) => ErrorCategory::Storage,
        OrchestratorError::Cancelled => ErrorCategory::Validation,
        OrchestratorError::Other(_) => ErrorCategory::Bootstrap,
    }
}

fn code_for(error: &OrchestratorError, category: ErrorCategory) -> String {
    let suffix = match error {
        OrchestratorError::Backend(_) => "backend_unavailable",
        OrchestratorError::Registry(_) => "model_unavailable",
        OrchestratorError::Memory(_) => "memory_degraded",
        OrchestratorError::Personality(_) => "personality_degraded",
        OrchestratorError::Storage(_) => "storage_failure",
        OrchestratorError::Telemetry(_) => "telemetry_failure",
        OrchestratorError::Cancelled => "request_cancelled",
        OrchestratorError::Other(_) => "internal_error",
    };
    format!("{}.{}", category.as_str(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_config::TelemetryConfig;
    use aegis_storage::Storage;

    async fn classifier() -> (ErrorClassifier, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("t.db"), 2).await.unwrap());
        let config = TelemetryConfig { enabled: true, collect_interval_secs: 3600, retention_days: 30 };
        let telemetry = Arc::new(TelemetryCollector::new(storage, config));
        (ErrorClassifier::new(telemetry), dir)
    }

    #[tokio::test]
    async fn cancellation_is_not_recoverable_and_maps_to_validation() {
        let (classifier, _dir) = classifier().await;
        let envelope = classifier.classify(&OrchestratorError::Cancelled);
        assert!(!envelope.recoverable);
        assert_eq!(envelope.status_code(ErrorCategory::Validation), 400);
    }

    #[tokio::test]
    async fn classify_increments_matching_counter() {
        let (classifier, _dir) = classifier().await;
        classifier.classify(&OrchestratorError::Cancelled);
        assert_eq!(classifier.telemetry.counter("errors.validation.total"), 1.0);
    }
}
