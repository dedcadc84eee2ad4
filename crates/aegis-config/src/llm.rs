use aegis_types::{KeepAlive, SlotName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-slot model configuration (spec.md §6 `llm.models`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSlotConfig {
    pub name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub context_window: u32,
}

/// Backend process launch configuration (spec.md §6 `llm.process`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Whether `BackendManager` is allowed to launch the backend itself.
    pub manage: bool,
    #[serde(with = "humantime_secs", default = "default_startup_timeout")]
    pub startup_timeout: Duration,
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            manage: true,
            startup_timeout: default_startup_timeout(),
        }
    }
}

/// The `llm` configuration tree (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(with = "humantime_secs", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub allow_runtime_switch: bool,
    #[serde(with = "humantime_secs", default = "default_switch_cooldown")]
    pub switch_cooldown: Duration,
    #[serde(default)]
    pub models: HashMap<SlotName, ModelSlotConfig>,
    #[serde(default)]
    pub keep_alive: KeepAlive,
    #[serde(default)]
    pub process: ProcessConfig,
    pub reasoning_model: Option<String>,
    #[serde(default)]
    pub reasoning_enabled: bool,
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_switch_cooldown() -> Duration {
    Duration::from_secs(5)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: default_timeout(),
            allow_runtime_switch: false,
            switch_cooldown: default_switch_cooldown(),
            models: HashMap::new(),
            keep_alive: KeepAlive::default(),
            process: ProcessConfig::default(),
            reasoning_model: None,
            reasoning_enabled: false,
        }
    }
}

/// Serde helper: (de)serialize a `Duration` as whole seconds.
mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
