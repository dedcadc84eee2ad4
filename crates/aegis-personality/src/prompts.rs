//! Prompts for personality inference and block compression (spec.md §4.8).

/// Build the inference prompt: a dedup list of currently-approved
/// fragments, plus the conversation text, asking for a JSON array of
/// `{content, confidence, category}` candidates.
#[must_use]
pub fn inference_prompt(conversation_text: &str, existing_approved: &[String]) -> String {
    let dedup_list = if existing_approved.is_empty() {
        "(none yet)".to_string()
    } else {
        existing_approved.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        "You are analyzing a conversation to learn facts about the user.\n\n\
         Facts already known about the user (do not repeat these):\n{dedup_list}\n\n\
         Conversation:\n{conversation_text}\n\n\
         Extract any NEW facts, preferences, or traits about the user that are not already \
         known. Respond with ONLY a JSON array of objects, each with \"content\" (a short, \
         third-person fact), \"confidence\" (0.0-1.0), and \"category\" (e.g. \"preference\", \
         \"fact\", \"trait\"). If there is nothing new, respond with an empty array []."
    )
}

/// Build the compression prompt used when the approved-fragment count
/// exceeds `compress_threshold` (spec.md §4.8 `getPersonalityBlock` step 3).
#[must_use]
pub fn compression_prompt(fragments: &[String], token_budget: u32) -> String {
    let bullet_list = fragments.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n");
    format!(
        "Condense the following facts about a user into a concise personality summary, \
         targeting approximately {token_budget} tokens. Write in second person (\"You...\") as \
         context for an AI assistant. Do not lose important distinguishing facts.\n\n{bullet_list}"
    )
}
