//! LLM slow-path classification prompt (spec.md §4.5).
//!
//! Adapted from `original_source/src/llm/prompts/intent_prompts.py`'s
//! `INTENT_CLASSIFICATION_PROMPT`, trimmed to the intent set `aegis-types`
//! actually models.

const TEMPLATE: &str = "Analyze the following user message and classify its intent.

User Message: {user_input}

Classify into exactly ONE of these intents:
- greeting: Hello, hi, hey, good morning, etc.
- farewell: Goodbye, bye, see you later, etc.
- general_conversation: Casual chat, small talk
- question: Asking for information or explanation
- complex_query: Deep analysis, multi-step reasoning, complex problems
- code_request: Write code, create program, implement feature
- code_explanation: Explain code, debug, code review
- file_operation: Read/write/manage files
- memory_recall: Remember something from past conversation
- creative: Write story, poem, creative content
- analysis: Analyze data, compare options, evaluate
- math: Mathematical calculations or problems
- translation: Translate between languages
- summarization: Summarize text or content
- help: Asking what the assistant can do, or for usage instructions
- settings: Changing configuration or preferences

Respond with ONLY the intent name in lowercase, nothing else.";

#[must_use]
pub fn classification_prompt(user_input: &str) -> String {
    TEMPLATE.replace("{user_input}", user_input)
}
