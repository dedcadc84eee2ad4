//! `IntentRouter`: keyword fast-path, LLM slow-path, circuit breaker
//! (spec.md §4.5).
//!
//! Grounded directly in `original_source/src/llm/router.py`: `_quick_classify`
//! (see `keywords`), and `_llm_classify`'s router-model lookup, circuit
//! breaker, and three-tier response parsing (exact, partial, fallback).

mod keywords;
mod prompts;

use aegis_backend::CallOverrides;
use aegis_registry::ModelRegistry;
use aegis_types::{Intent, IntentResult, Message, SlotName};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// How many consecutive router-model load failures before the circuit opens.
const CIRCUIT_FAILURE_THRESHOLD: u32 = 3;
/// How long the circuit stays open before the next load attempt is allowed.
const CIRCUIT_COOLDOWN: Duration = Duration::from_secs(300);

/// Routes user input to the intent that will decide which model slot and
/// extensions handle it. Keyword classification never touches the registry;
/// the LLM slow-path borrows the `Router` slot (spec.md §4.4 interlock),
/// falling back to `Fast` when the router model is unavailable, unloaded and
/// failing to load, or the circuit is open.
pub struct IntentRouter {
    registry: std::sync::Arc<ModelRegistry>,
    router_failure_count: AtomicU32,
    router_circuit_open_until: Mutex<Option<Instant>>,
}

impl IntentRouter {
    #[must_use]
    pub fn new(registry: std::sync::Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            router_failure_count: AtomicU32::new(0),
            router_circuit_open_until: Mutex::new(None),
        }
    }

    /// Classify `user_input`: try the keyword fast-path first, falling
    /// through to the LLM slow-path (spec.md §4.5 `classify`).
    pub async fn classify(&self, user_input: &str) -> IntentResult {
        let input_lower = user_input.to_lowercase();
        let input_lower = input_lower.trim();

        if let Some(result) = keywords::quick_classify(input_lower) {
            return result;
        }

        self.llm_classify(user_input).await
    }

    fn circuit_open(&self) -> bool {
        match *self.router_circuit_open_until.lock() {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    fn record_router_failure(&self) {
        let count = self.router_failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(
            failures = count,
            threshold = CIRCUIT_FAILURE_THRESHOLD,
            "router model load failed"
        );
        if count >= CIRCUIT_FAILURE_THRESHOLD {
            let open_until = Instant::now() + CIRCUIT_COOLDOWN;
            *self.router_circuit_open_until.lock() = Some(open_until);
            tracing::warn!(
                cooldown_secs = CIRCUIT_COOLDOWN.as_secs(),
                "router model circuit opened; classification will use the fast model until cooldown expires"
            );
        }
    }

    fn reset_circuit(&self) {
        self.router_failure_count.store(0, Ordering::SeqCst);
    }

    async fn llm_classify(&self, user_input: &str) -> IntentResult {
        let circuit_open = self.circuit_open();

        let slot = if circuit_open {
            // The router slot shares its client with fast (spec.md §4.4):
            // if fast isn't loaded either, `get_client` below would retry
            // the identical failing load under the "fast" label, defeating
            // the cooldown. Bail out to the fallback intent instead.
            if !self.registry.is_loaded(SlotName::Fast) {
                tracing::debug!("router circuit open and fast model not loaded, skipping load attempt");
                return IntentResult::from_intent(Intent::GeneralConversation, 0.3, None);
            }
            tracing::debug!("router model circuit open, using already-loaded fast model for classification");
            SlotName::Fast
        } else {
            match self.registry.get_client(SlotName::Router).await {
                Ok(_) => {
                    self.reset_circuit();
                    SlotName::Router
                }
                Err(e) => {
                    self.record_router_failure();
                    tracing::warn!(error = %e, "router model unavailable, using fast model");
                    SlotName::Fast
                }
            }
        };

        let client = match self.registry.get_client(slot).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "fast model also unavailable, using fallback intent");
                return IntentResult::from_intent(Intent::GeneralConversation, 0.3, None);
            }
        };

        let prompt = prompts::classification_prompt(user_input);
        let overrides = CallOverrides { temperature: Some(0.1), max_tokens: Some(50), stop: None };

        let response = match client.generate(&[Message::user(prompt)], overrides).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "LLM classification failed, using fallback intent");
                return IntentResult::from_intent(Intent::GeneralConversation, 0.3, None);
            }
        };

        parse_classification(&response.content)
    }
}

/// Three-tier parse: exact match, partial/substring match, fallback
/// (spec.md §4.5, `_llm_classify`'s response parsing).
fn parse_classification(raw: &str) -> IntentResult {
    let normalized = raw.trim().to_lowercase().replace('-', "_").replace(' ', "_");

    if let Some(intent) = Intent::ALL.iter().find(|i| i.as_str() == normalized) {
        return IntentResult::from_intent(*intent, 0.9, Some(raw.to_string()));
    }

    if let Some(intent) =
        Intent::ALL.iter().find(|i| normalized.contains(i.as_str()) || i.as_str().contains(&normalized))
    {
        return IntentResult::from_intent(*intent, 0.7, Some(raw.to_string()));
    }

    IntentResult::from_intent(Intent::GeneralConversation, 0.5, Some(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_config::{LlmConfig, ModelSlotConfig, ProcessConfig};
    use aegis_types::KeepAlive;
    use std::collections::HashMap as StdHashMap;

    fn config_with_fast_only() -> LlmConfig {
        let mut config = LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(30),
            allow_runtime_switch: false,
            switch_cooldown: Duration::from_secs(5),
            models: StdHashMap::new(),
            keep_alive: KeepAlive::default(),
            process: ProcessConfig::default(),
            reasoning_model: None,
            reasoning_enabled: false,
        };
        config.models.insert(
            SlotName::Fast,
            ModelSlotConfig { name: "llama3".to_string(), max_tokens: 512, temperature: 0.7, context_window: 4096 },
        );
        config
    }

    async fn router_with_unreachable_backend() -> IntentRouter {
        let config = config_with_fast_only();
        let registry = aegis_registry::ModelRegistry::initialize(&config).await.unwrap();
        IntentRouter::new(std::sync::Arc::new(registry))
    }

    #[tokio::test]
    async fn circuit_closed_initially() {
        let router = router_with_unreachable_backend().await;
        assert!(!router.circuit_open());
    }

    #[tokio::test]
    async fn record_router_failure_opens_circuit_at_threshold() {
        let router = router_with_unreachable_backend().await;
        for _ in 0..CIRCUIT_FAILURE_THRESHOLD - 1 {
            router.record_router_failure();
            assert!(!router.circuit_open());
        }
        router.record_router_failure();
        assert!(router.circuit_open());
    }

    #[tokio::test]
    async fn reset_circuit_clears_failure_count_but_not_an_open_circuit() {
        let router = router_with_unreachable_backend().await;
        for _ in 0..CIRCUIT_FAILURE_THRESHOLD {
            router.record_router_failure();
        }
        assert!(router.circuit_open());
        router.reset_circuit();
        // reset_circuit only zeroes the failure counter; an already-open
        // circuit keeps its cooldown deadline until it naturally expires.
        assert!(router.circuit_open());
    }

    #[tokio::test]
    async fn llm_classify_falls_back_when_router_and_fast_both_unreachable() {
        let router = router_with_unreachable_backend().await;
        let result = router.llm_classify("some unclassifiable input").await;
        assert_eq!(result.intent_type, Intent::GeneralConversation);
        assert_eq!(result.confidence, 0.3);
    }

    #[tokio::test]
    async fn llm_classify_skips_fast_load_retry_once_circuit_is_open() {
        let router = router_with_unreachable_backend().await;
        // Drive the circuit open: each call against the unreachable backend
        // records one router-load failure.
        for _ in 0..CIRCUIT_FAILURE_THRESHOLD {
            let _ = router.llm_classify("warm up the circuit").await;
        }
        assert!(router.circuit_open());

        // A further call, with fast never having loaded, must not attempt
        // the load again -- it should short-circuit straight to the
        // fallback intent rather than retry the identical failing dial.
        let result = router.llm_classify("another message").await;
        assert_eq!(result.intent_type, Intent::GeneralConversation);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn parse_classification_exact_match() {
        let result = parse_classification("code_request");
        assert_eq!(result.intent_type, Intent::CodeRequest);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn parse_classification_handles_hyphens_and_whitespace() {
        let result = parse_classification(" Code-Request ");
        assert_eq!(result.intent_type, Intent::CodeRequest);
    }

    #[test]
    fn parse_classification_partial_match() {
        let result = parse_classification("this looks like a question to me");
        assert_eq!(result.intent_type, Intent::Question);
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn parse_classification_falls_back_to_general_conversation() {
        let result = parse_classification("completely unrecognizable gibberish");
        assert_eq!(result.intent_type, Intent::GeneralConversation);
        assert_eq!(result.confidence, 0.5);
    }
}
