//! The `memory` configuration tree (spec.md §6).

use serde::{Deserialize, Serialize};

/// `memory.short_term` (spec.md §6, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermConfig {
    pub max_messages: usize,
    #[serde(rename = "expire_after_secs")]
    pub expire_after_secs: u64,
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            expire_after_secs: 3600,
        }
    }
}

/// `memory.long_term` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermConfig {
    pub auto_extract: bool,
    /// Every `extract_interval`-th turn triggers learning extraction
    /// (spec.md §4.10 step 5).
    pub extract_interval: u32,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            auto_extract: true,
            extract_interval: 5,
        }
    }
}

/// `memory.retrieval` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub threshold: f32,
    pub max_results: usize,
    pub reranking: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_results: 5,
            reranking: false,
        }
    }
}

/// `memory.embeddings` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimension: 768,
        }
    }
}

/// `memory.personality` (spec.md §6, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityConfig {
    pub inferential_learning_enabled: bool,
    pub inferential_learning_requires_approval: bool,
    pub auto_approve_enabled: bool,
    pub auto_approve_threshold: f32,
    pub learning_mode: String,
    pub personality_token_budget: u32,
    pub max_fragments_in_prompt: usize,
    pub compress_threshold: usize,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            inferential_learning_enabled: true,
            inferential_learning_requires_approval: true,
            auto_approve_enabled: false,
            auto_approve_threshold: 0.85,
            learning_mode: "passive".to_string(),
            personality_token_budget: 400,
            max_fragments_in_prompt: 10,
            compress_threshold: 15,
        }
    }
}

/// `memory` (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub short_term: ShortTermConfig,
    #[serde(default)]
    pub long_term: LongTermConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub personality: PersonalityConfig,
}
