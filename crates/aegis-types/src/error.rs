//! The boundary error envelope (spec.md §6 "Error envelope").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse error category, used by `ErrorClassifier` to pick a transport
/// status code and to tag the `errors.<category>.total` telemetry counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport,
    Memory,
    Extension,
    Storage,
    Bootstrap,
    Validation,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Memory => "memory",
            ErrorCategory::Extension => "extension",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Bootstrap => "bootstrap",
            ErrorCategory::Validation => "validation",
        }
    }
}

/// The structured error produced at any boundary (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub recoverable: bool,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            recoverable,
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Status code mapping at the transport boundary (spec.md §6).
    #[must_use]
    pub fn status_code(&self, category: ErrorCategory) -> u16 {
        if category == ErrorCategory::Validation {
            return 400;
        }
        if self.recoverable {
            503
        } else {
            500
        }
    }
}
