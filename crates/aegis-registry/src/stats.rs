//! Registry statistics snapshot (spec.md §4.4 `stats`).

use aegis_types::SlotName;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_name: String,
    pub use_count: u64,
    pub total_tokens: u64,
    pub avg_duration_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub active_slot: Option<SlotName>,
    pub last_switch: Option<DateTime<Utc>>,
    pub models: HashMap<SlotName, ModelStats>,
}
