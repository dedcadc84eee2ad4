//! The `telemetry` configuration tree (spec.md §6, §4.11).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub collect_interval_secs: u64,
    pub retention_days: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_interval_secs: 30,
            retention_days: 30,
        }
    }
}
