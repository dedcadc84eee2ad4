//! Keyword tables and the quick-classify decision order (spec.md §4.5).
//!
//! Ported verbatim from `original_source/src/llm/router.py::_quick_classify`:
//! plain `const` slices checked with `.iter().any()`, not a `phf` map.

use aegis_types::{Intent, IntentResult};

const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "howdy",
    "greetings",
    "yo",
    "sup",
];

const FAREWELL_KEYWORDS: &[&str] = &[
    "bye",
    "goodbye",
    "see you",
    "later",
    "farewell",
    "good night",
    "take care",
    "cya",
    "gtg",
];

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "program",
    "function",
    "class",
    "implement",
    "write",
    "create",
    "build",
    "develop",
    "script",
    "python",
    "javascript",
    "java",
    "c++",
    "rust",
    "debug",
    "fix",
    "error",
    "bug",
];

const CODE_EXPLANATION_KEYWORDS: &[&str] = &["explain", "what does", "how does", "understand"];

const MEMORY_INDICATORS: &[&str] = &[
    "remember",
    "recall",
    "last time",
    "previously",
    "before",
    "earlier",
    "you said",
    "we discussed",
    "mentioned",
    "told you",
    "forgot",
];

const FILE_KEYWORDS: &[&str] = &[
    "file",
    "files",
    "folder",
    "folders",
    "directory",
    "directories",
    "downloads",
    "desktop",
    "documents",
    "path",
    "filename",
];

const FILE_ACTION_KEYWORDS: &[&str] =
    &["find", "search", "locate", "check", "look for", "exists", "is there", "do i have", "in my"];

const QUESTION_STARTS: &[&str] =
    &["what", "who", "where", "when", "why", "how", "is", "are", "can", "could", "would", "should"];

const COMPLEX_QUERY_KEYWORDS: &[&str] = &["analyze", "compare", "explain why", "in depth"];

/// Attempt keyword-only classification. Returns `None` when no keyword
/// table produces a confident match, signalling the caller to fall through
/// to the LLM slow-path (spec.md §4.5 `classify`).
#[must_use]
pub fn quick_classify(input_lower: &str) -> Option<IntentResult> {
    let words: std::collections::HashSet<&str> = input_lower.split_whitespace().collect();

    if words.len() <= 3 && GREETING_KEYWORDS.iter().any(|kw| input_lower.contains(kw)) {
        return Some(IntentResult::from_intent(Intent::Greeting, 0.95, None));
    }

    if FAREWELL_KEYWORDS.iter().any(|kw| input_lower.contains(kw)) {
        return Some(IntentResult::from_intent(Intent::Farewell, 0.9, None));
    }

    let code_matches = CODE_KEYWORDS.iter().filter(|kw| input_lower.contains(*kw)).count();
    if code_matches >= 2 {
        if CODE_EXPLANATION_KEYWORDS.iter().any(|kw| input_lower.contains(kw)) {
            return Some(IntentResult::from_intent(Intent::CodeExplanation, 0.85, None));
        }
        return Some(IntentResult::from_intent(Intent::CodeRequest, 0.85, None));
    }

    if MEMORY_INDICATORS.iter().any(|kw| input_lower.contains(kw)) {
        return Some(IntentResult::from_intent(Intent::MemoryRecall, 0.9, None));
    }

    let mentions_file = FILE_KEYWORDS.iter().any(|kw| input_lower.contains(kw));
    let mentions_action = FILE_ACTION_KEYWORDS.iter().any(|kw| input_lower.contains(kw));
    if mentions_file && mentions_action {
        return Some(IntentResult::from_intent(Intent::FileOperation, 0.85, None));
    }

    let looks_like_question =
        input_lower.ends_with('?') || QUESTION_STARTS.iter().any(|kw| input_lower.starts_with(kw));
    if looks_like_question {
        let is_complex = input_lower.len() > 100
            || COMPLEX_QUERY_KEYWORDS.iter().any(|kw| input_lower.contains(kw));
        if is_complex {
            return Some(IntentResult::from_intent(Intent::ComplexQuery, 0.8, None));
        }
        return Some(IntentResult::from_intent(Intent::Question, 0.8, None));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_requires_short_input() {
        assert_eq!(quick_classify("hi").unwrap().intent_type, Intent::Greeting);
        assert!(quick_classify("hi there, i wanted to ask you something longer").is_none());
    }

    #[test]
    fn farewell_matches_anywhere() {
        assert_eq!(quick_classify("ok, see you later!").unwrap().intent_type, Intent::Farewell);
    }

    #[test]
    fn code_request_vs_explanation() {
        assert_eq!(
            quick_classify("can you write a function to sort a list").unwrap().intent_type,
            Intent::CodeRequest
        );
        assert_eq!(
            quick_classify("can you explain what this function does").unwrap().intent_type,
            Intent::CodeExplanation
        );
    }

    #[test]
    fn memory_recall_beats_question_check() {
        assert_eq!(
            quick_classify("do you remember what we discussed earlier?").unwrap().intent_type,
            Intent::MemoryRecall
        );
    }

    #[test]
    fn file_operation_needs_both_noun_and_action() {
        assert_eq!(
            quick_classify("can you find a file in my downloads").unwrap().intent_type,
            Intent::FileOperation
        );
        assert!(quick_classify("i like my downloads folder").is_none());
    }

    #[test]
    fn question_complexity_split() {
        assert_eq!(quick_classify("what time is it?").unwrap().intent_type, Intent::Question);
        assert_eq!(
            quick_classify("can you analyze and compare these two approaches in depth?")
                .unwrap()
                .intent_type,
            Intent::ComplexQuery
        );
    }

    #[test]
    fn no_match_falls_through() {
        assert!(quick_classify("the weather today is nice").is_none());
    }
}
