//! Typed configuration tree for the aegis runtime (spec.md §6).
//!
//! Parsing the *file format* is explicitly out of scope (spec.md §1's
//! Non-goals name "config-file parsing format"); the `toml` crate already
//! does that. What lives here is the typed struct the rest of the runtime
//! consumes, plus a loader that merges a TOML file with `AEGIS_`-prefixed
//! environment overrides, mirroring the teacher's use of `toml` + `serde`
//! for structured config throughout `dashflow`.

mod error;
mod llm;
mod memory;
mod telemetry;

pub use error::{ConfigError, Result};
pub use llm::{LlmConfig, ModelSlotConfig, ProcessConfig};
pub use memory::{
    EmbeddingsConfig, LongTermConfig, MemoryConfig, PersonalityConfig, RetrievalConfig,
    ShortTermConfig,
};
pub use telemetry::TelemetryConfig;

use aegis_types::SlotName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration tree (spec.md §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub telemetry: TelemetryConfig,
    /// Directory all persisted state is resolved relative to
    /// (spec.md §6 "Persisted state layout").
    #[serde(default = "default_app_data_dir")]
    pub app_data_dir: PathBuf,
}

fn default_app_data_dir() -> PathBuf {
    PathBuf::from("./aegis-data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            telemetry: TelemetryConfig::default(),
            app_data_dir: default_app_data_dir(),
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply `AEGIS_`-prefixed environment
    /// overrides on top. Unlike `std::env::vars()`-driven frameworks the
    /// teacher doesn't use here, this only recognizes a small fixed set of
    /// override keys (the ones a local single-user deployment actually needs
    /// to flip without editing the file): `AEGIS_APP_DATA_DIR`,
    /// `AEGIS_LLM_BASE_URL`, `AEGIS_TELEMETRY_ENABLED`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("AEGIS_APP_DATA_DIR") {
            self.app_data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("AEGIS_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(enabled) = std::env::var("AEGIS_TELEMETRY_ENABLED") {
            if let Ok(b) = enabled.parse::<bool>() {
                self.telemetry.enabled = b;
            }
        }
    }

    /// Every distinct model name configured across all slots (the router
    /// slot is never independently configured - spec.md §4.4 - so it
    /// contributes no name of its own here).
    #[must_use]
    pub fn unique_model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .llm
            .models
            .iter()
            .filter(|(slot, _)| **slot != SlotName::Router)
            .map(|(_, m)| m.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Map of configured model slots, keyed by `SlotName`.
pub type ModelSlotMap = HashMap<SlotName, ModelSlotConfig>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_models_and_telemetry_disabled_by_default() {
        let config = Config::default();
        assert!(config.llm.models.is_empty());
        assert_eq!(config.telemetry.collect_interval_secs, 30);
    }

    #[test]
    fn unique_model_names_dedupes_and_excludes_router() {
        let mut config = Config::default();
        config.llm.models.insert(
            SlotName::Fast,
            ModelSlotConfig {
                name: "llama3:8b".into(),
                max_tokens: 2048,
                temperature: 0.7,
                context_window: 8192,
            },
        );
        config.llm.models.insert(
            SlotName::Critical,
            ModelSlotConfig {
                name: "llama3:8b".into(),
                max_tokens: 4096,
                temperature: 0.5,
                context_window: 8192,
            },
        );
        config.llm.models.insert(
            SlotName::Router,
            ModelSlotConfig {
                name: "should-be-ignored".into(),
                max_tokens: 50,
                temperature: 0.1,
                context_window: 8192,
            },
        );
        assert_eq!(config.unique_model_names(), vec!["llama3:8b".to_string()]);
    }

    #[test]
    fn load_applies_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aegis.toml");
        std::fs::write(
            &path,
            r#"
            app_data_dir = "/var/lib/aegis"

            [llm]
            base_url = "http://localhost:11434"

            [memory.short_term]
            max_messages = 20
            expire_after_secs = 3600

            [memory.long_term]
            auto_extract = true
            extract_interval = 10

            [memory.retrieval]
            threshold = 0.3
            max_results = 5
            reranking = false

            [memory.embeddings]
            model = "nomic-embed-text"
            dimension = 768

            [memory.personality]
            inferential_learning_enabled = true
            inferential_learning_requires_approval = false
            auto_approve_enabled = true
            auto_approve_threshold = 0.85
            learning_mode = "active"
            personality_token_budget = 256
            max_fragments_in_prompt = 10
            compress_threshold = 15

            [telemetry]
            enabled = true
            collect_interval_secs = 30
            retention_days = 30
            "#,
        )
        .unwrap();

        std::env::set_var("AEGIS_APP_DATA_DIR", "/tmp/aegis-override");
        let config = Config::load(&path).unwrap();
        std::env::remove_var("AEGIS_APP_DATA_DIR");

        assert_eq!(config.app_data_dir, PathBuf::from("/tmp/aegis-override"));
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.memory.short_term.max_messages, 20);
    }
}
