//! Base system prompts and the capabilities block injected ahead of the
//! personality block (spec.md §4.10 step 4; grounded on
//! `original_source/src/llm/prompts/system_prompts.py`'s `get_system_prompt`/
//! `build_capabilities_block`).

const DEFAULT_PROMPT: &str = "You are Aegis, a highly capable local AI assistant. You are:
- Knowledgeable across many domains including technology, science, arts, and humanities
- Precise and accurate in your responses
- Friendly but professional in tone
- Capable of admitting when you don't know something

You have access to memory of past conversations and can recall relevant information when needed.
You also have access to extensions that can help you accomplish tasks.

Guidelines:
1. Provide clear, well-structured responses
2. Use markdown formatting when appropriate
3. Ask clarifying questions when the request is ambiguous
4. Cite sources or mention uncertainty when appropriate";

const CONCISE_PROMPT: &str = "You are Aegis, a concise AI assistant.

Rules:
- Be brief and to the point
- No unnecessary elaboration
- Use bullet points for lists
- Skip pleasantries unless asked";

const CODE_PROMPT: &str = "You are Aegis, an expert programming assistant.

When writing code:
1. Write clean, readable code
2. Follow language-specific best practices and conventions
3. Handle errors appropriately
4. Consider edge cases
5. Explain implementation choices when relevant";

const ANALYSIS_PROMPT: &str = "You are Aegis, an analytical AI assistant specialized in deep analysis.

When analyzing:
1. Break down complex problems into components
2. Consider multiple viewpoints and possibilities
3. Present findings in a structured manner
4. Distinguish between facts, inferences, and opinions";

/// Prompt mode selected per-request, derived from the classified intent
/// (spec.md §4.10 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Default,
    Concise,
    Code,
    Analysis,
}

impl PromptMode {
    #[must_use]
    pub fn for_intent(intent: aegis_types::Intent) -> Self {
        use aegis_types::Intent;
        match intent {
            Intent::CodeExplanation | Intent::CodeRequest => PromptMode::Code,
            Intent::Analysis | Intent::ComplexQuery => PromptMode::Analysis,
            Intent::Greeting | Intent::Farewell | Intent::Help | Intent::Settings => PromptMode::Concise,
            _ => PromptMode::Default,
        }
    }

    #[must_use]
    pub fn base_prompt(self) -> &'static str {
        match self {
            PromptMode::Default => DEFAULT_PROMPT,
            PromptMode::Concise => CONCISE_PROMPT,
            PromptMode::Code => CODE_PROMPT,
            PromptMode::Analysis => ANALYSIS_PROMPT,
        }
    }
}

const NO_EXTENSIONS_SECTION: &str = "No extensions are currently enabled. You are operating with memory only. \
If a task requires file access or another capability, say so rather than pretending you can do it.";

/// Build the capabilities block describing which extensions ran for this
/// request and what they returned (spec.md §4.10 step 4).
#[must_use]
pub fn capabilities_block(extension_lines: &[String]) -> String {
    let section = if extension_lines.is_empty() {
        NO_EXTENSIONS_SECTION.to_string()
    } else {
        let mut lines = vec!["Extension results for this request:".to_string()];
        lines.extend(extension_lines.iter().cloned());
        lines.join("\n")
    };

    format!("\n## Your Capabilities\n\n{section}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_types::Intent;

    #[test]
    fn code_intents_select_code_mode() {
        assert_eq!(PromptMode::for_intent(Intent::CodeRequest), PromptMode::Code);
    }

    #[test]
    fn greeting_selects_concise_mode() {
        assert_eq!(PromptMode::for_intent(Intent::Greeting), PromptMode::Concise);
    }

    #[test]
    fn empty_extensions_yields_no_extensions_section() {
        let block = capabilities_block(&[]);
        assert!(block.contains("No extensions are currently enabled"));
    }

    #[test]
    fn nonempty_extensions_are_listed() {
        let block = capabilities_block(&["- file_search: no matches".to_string()]);
        assert!(block.contains("file_search"));
    }
}
