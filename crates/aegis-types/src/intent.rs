//! Intent classification result.

use crate::slot::SlotName;
use serde::{Deserialize, Serialize};

/// The classified intent of a user message.
///
/// The keyword fast-path in `aegis-intent` only ever produces a subset of
/// these variants directly; the rest (`Help`, `Settings`, `Math`,
/// `Translation`, `Creative`, `Analysis`, `Summarization`) are reachable via
/// the LLM slow-path and are first-class here so `RetrievalEngine`'s
/// always/never-retrieve tables (spec §4.9) can match exhaustively instead of
/// falling back to string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    CodeExplanation,
    CodeRequest,
    MemoryRecall,
    FileOperation,
    ComplexQuery,
    Question,
    GeneralConversation,
    Help,
    Settings,
    Math,
    Translation,
    Creative,
    Analysis,
    Summarization,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::CodeExplanation => "code_explanation",
            Intent::CodeRequest => "code_request",
            Intent::MemoryRecall => "memory_recall",
            Intent::FileOperation => "file_operation",
            Intent::ComplexQuery => "complex_query",
            Intent::Question => "question",
            Intent::GeneralConversation => "general_conversation",
            Intent::Help => "help",
            Intent::Settings => "settings",
            Intent::Math => "math",
            Intent::Translation => "translation",
            Intent::Creative => "creative",
            Intent::Analysis => "analysis",
            Intent::Summarization => "summarization",
        }
    }

    /// All variants, in declaration order - used by the LLM slow-path parser
    /// to match the model's raw response token against the enum.
    pub const ALL: [Intent; 16] = [
        Intent::Greeting,
        Intent::Farewell,
        Intent::CodeExplanation,
        Intent::CodeRequest,
        Intent::MemoryRecall,
        Intent::FileOperation,
        Intent::ComplexQuery,
        Intent::Question,
        Intent::GeneralConversation,
        Intent::Help,
        Intent::Settings,
        Intent::Math,
        Intent::Translation,
        Intent::Creative,
        Intent::Analysis,
        Intent::Summarization,
    ];

    /// Fixed intent -> model slot mapping (spec.md §4.5).
    #[must_use]
    pub fn recommended_slot(self) -> SlotName {
        match self {
            Intent::Greeting | Intent::Farewell | Intent::Help | Intent::Settings => {
                SlotName::Fast
            }
            Intent::ComplexQuery | Intent::Math | Intent::Creative | Intent::Analysis => {
                SlotName::Critical
            }
            Intent::CodeExplanation | Intent::CodeRequest | Intent::FileOperation => {
                SlotName::Code
            }
            Intent::MemoryRecall
            | Intent::Question
            | Intent::GeneralConversation
            | Intent::Translation
            | Intent::Summarization => SlotName::Fast,
        }
    }

    /// Fixed intent -> required extensions mapping (spec.md §4.5).
    #[must_use]
    pub fn required_extensions(self) -> &'static [&'static str] {
        match self {
            Intent::FileOperation => &["file_search"],
            _ => &[],
        }
    }

    /// Fixed intent -> needs-memory boolean (spec.md §4.5).
    #[must_use]
    pub fn needs_memory(self) -> bool {
        matches!(
            self,
            Intent::MemoryRecall
                | Intent::GeneralConversation
                | Intent::Question
                | Intent::ComplexQuery
                | Intent::Analysis
                | Intent::Summarization
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of classifying a request (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent_type: Intent,
    pub recommended_model: SlotName,
    pub required_extensions: Vec<String>,
    pub needs_memory: bool,
    pub confidence: f32,
    pub raw_response: Option<String>,
}

impl IntentResult {
    #[must_use]
    pub fn from_intent(intent: Intent, confidence: f32, raw_response: Option<String>) -> Self {
        Self {
            intent_type: intent,
            recommended_model: intent.recommended_slot(),
            required_extensions: intent
                .required_extensions()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            needs_memory: intent.needs_memory(),
            confidence,
            raw_response,
        }
    }
}
