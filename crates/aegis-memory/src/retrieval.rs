//! `RetrievalEngine`: stateless policy deciding *whether* to retrieve, and
//! the heuristic learning-extraction fallback (spec.md §4.9).

use crate::long_term::{LongTermMemory, LongTermMemoryRecord, ScoredLongTermMemory};
use crate::short_term::{ShortTermItem, ShortTermMemory};
use aegis_types::Intent;
use std::collections::HashMap;

/// The combined retrieval result handed to the orchestrator (spec.md §4.9
/// `retrieveRelevant`).
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub short_term: Vec<ShortTermItem>,
    pub long_term: Vec<ScoredLongTermMemory>,
}

const ALWAYS_RETRIEVE: &[Intent] = &[
    Intent::MemoryRecall,
    Intent::GeneralConversation,
    Intent::Question,
    Intent::ComplexQuery,
    Intent::Analysis,
    Intent::Summarization,
];

const NEVER_RETRIEVE: &[Intent] =
    &[Intent::Greeting, Intent::Farewell, Intent::Help, Intent::Settings, Intent::Math, Intent::Translation];

const RECALL_PHRASES: &[&str] = &["remember", "recall", "last time", "you said", "we discussed", "mentioned"];

const PERSONAL_CONTEXT_PATTERNS: &[&str] =
    &["my name", "my job", "my favorite", "i work", "i live", "my family", "i am a", "i'm a"];

const AMBIGUOUS_PRONOUNS: &[&str] = &["it", "that", "this", "they", "them", "he", "she"];

const INTERROGATIVE_STARTS: &[&str] =
    &["what", "who", "where", "when", "why", "how", "is", "are", "can", "could", "would", "should"];

/// Lines containing one of these marker phrases are returned verbatim as a
/// "learning" by the heuristic extraction fallback (spec.md §4.9
/// `extractLearnings`).
const LEARNING_MARKERS: &[&str] =
    &["i learned", "important:", "user prefers", "note:", "remember that", "key fact:"];

pub struct RetrievalEngine;

impl RetrievalEngine {
    /// Decide whether to retrieve memories for this turn (spec.md §4.9
    /// `shouldRetrieve`).
    #[must_use]
    pub fn should_retrieve(user_input: &str, intent: Option<Intent>) -> bool {
        if let Some(intent) = intent {
            if ALWAYS_RETRIEVE.contains(&intent) {
                return true;
            }
            if NEVER_RETRIEVE.contains(&intent) {
                return false;
            }
        }

        let lower = user_input.to_lowercase();
        let trimmed = lower.trim();

        if RECALL_PHRASES.iter().any(|p| trimmed.contains(p)) {
            return true;
        }
        if PERSONAL_CONTEXT_PATTERNS.iter().any(|p| trimmed.contains(p)) {
            return true;
        }
        if AMBIGUOUS_PRONOUNS.iter().any(|p| {
            trimmed.split_whitespace().next() == Some(p)
        }) {
            return true;
        }
        if trimmed.ends_with('?') || INTERROGATIVE_STARTS.iter().any(|p| trimmed.starts_with(p)) {
            return true;
        }
        if trimmed.split_whitespace().count() <= 3 {
            return true;
        }

        false
    }

    /// Gather the current short-term buffer plus a long-term search
    /// (spec.md §4.9 `retrieveRelevant`).
    pub async fn retrieve_relevant(
        short_term: &ShortTermMemory,
        long_term: &LongTermMemory,
        session: &str,
        user_input: &str,
        k: usize,
        metadata_filter: Option<&HashMap<String, serde_json::Value>>,
    ) -> crate::error::Result<RetrievedContext> {
        let short_term_items = short_term.get_all(session).await;
        let long_term_items = long_term.search(user_input, k, metadata_filter, None).await?;
        Ok(RetrievedContext { short_term: short_term_items, long_term: long_term_items })
    }

    /// Heuristic extraction: any line containing a marker phrase is
    /// returned verbatim (spec.md §4.9 `extractLearnings`). Kept as an
    /// explicit fallback alongside LLM-based personality inference, per
    /// spec.md §4.9's own retained operation.
    #[must_use]
    pub fn extract_learnings(conversation_text: &str) -> Vec<String> {
        conversation_text
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                LEARNING_MARKERS.iter().any(|m| lower.contains(m))
            })
            .map(|line| line.trim().to_string())
            .collect()
    }

    /// Store extracted learnings in long-term memory, one embedding per
    /// line (spec.md §4.9 `storeLearnings`, ported from
    /// `original_source/src/memory/retrieval.py::RetrievalEngine.store_learnings`:
    /// blank lines are skipped, each surviving line's embedding is
    /// generated before `long_term.add`, and a per-line failure is logged
    /// and skipped rather than aborting the whole batch).
    pub async fn store_learnings(
        long_term: &LongTermMemory,
        learnings: &[String],
        metadata: HashMap<String, serde_json::Value>,
    ) -> Vec<LongTermMemoryRecord> {
        let mut results = Vec::new();

        for learning in learnings {
            if learning.trim().is_empty() {
                continue;
            }

            let embedding = long_term.embed(learning).await;
            match long_term.add(learning, metadata.clone(), embedding, None, 5).await {
                Ok(record) => results.push(record),
                Err(e) => tracing::warn!(error = %e, "failed to store learning"),
            }
        }

        tracing::info!(count = results.len(), "stored learnings in long-term memory");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_retrieve_intents_short_circuit() {
        assert!(RetrievalEngine::should_retrieve("unrelated text", Some(Intent::MemoryRecall)));
    }

    #[test]
    fn never_retrieve_intents_short_circuit() {
        assert!(!RetrievalEngine::should_retrieve(
            "remember this forever",
            Some(Intent::Greeting)
        ));
    }

    #[test]
    fn short_continuation_triggers_retrieval() {
        assert!(RetrievalEngine::should_retrieve("and then?", None));
    }

    #[test]
    fn ambiguous_pronoun_start_triggers_retrieval() {
        assert!(RetrievalEngine::should_retrieve(
            "it was really interesting honestly speaking",
            None
        ));
    }

    #[test]
    fn plain_statement_does_not_trigger_retrieval() {
        assert!(!RetrievalEngine::should_retrieve(
            "the weather has been quite lovely this week overall",
            None
        ));
    }

    #[test]
    fn extract_learnings_matches_marker_phrases() {
        let text = "hello there\nImportant: the user prefers dark mode\nsomething else\nUser prefers tea";
        let learnings = RetrievalEngine::extract_learnings(text);
        assert_eq!(learnings.len(), 2);
        assert!(learnings[0].contains("dark mode"));
    }
}
