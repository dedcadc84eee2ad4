//! `Orchestrator`: the per-request pipeline (spec.md §4.10).
//!
//! Grounded on `original_source/src/core/assistant.py`'s `process_message`
//! (the intent -> memory -> extensions -> generation -> post-processing
//! sequence) and `original_source/src/core/pipeline.py`'s stage bookkeeping,
//! reified here as the explicit `aegis_types::Pipeline` state machine rather
//! than a sequence of dict mutations.

use crate::error::{OrchestratorError, Result};
use crate::events::{EventBus, RuntimeEvent};
use crate::extensions::{ExtensionContext, ExtensionOutcome, ExtensionRegistry};
use crate::pipelines::PipelineStore;
use crate::prompts::{capabilities_block, PromptMode};
use aegis_backend::CallOverrides;
use aegis_config::MemoryConfig;
use aegis_intent::IntentRouter;
use aegis_memory::{LongTermMemory, RetrievalEngine, ScoredLongTermMemory, ShortTermMemory};
use aegis_personality::PersonalityManager;
use aegis_registry::ModelRegistry;
use aegis_storage::Storage;
use aegis_telemetry::{MetricKind, TelemetryCollector};
use aegis_types::{Intent, Message, Pipeline, Role, Stage};
use async_stream::stream;
use dashmap::DashMap;
use futures::Stream;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A single turn's input (spec.md §3 "ProcessRequest").
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub session_id: String,
    pub user_input: String,
    pub cancel: CancellationToken,
}

impl ProcessRequest {
    #[must_use]
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), user_input: user_input.into(), cancel: CancellationToken::new() }
    }
}

/// The completed turn's output (spec.md §3 "ProcessResponse").
#[derive(Debug, Clone)]
pub struct ProcessResponse {
    pub request_id: String,
    pub content: String,
    pub model: String,
    pub slot: aegis_types::SlotName,
    pub intent: Intent,
    pub duration_ms: u64,
}

/// Session-matching pattern used to scope long-term recall when the user
/// refers to a specific prior session by ordinal (spec.md §4.10 step 2,
/// grounded on `original_source/src/core/assistant.py`'s session-reference
/// detection).
fn session_reference(user_input: &str) -> Option<HashMap<String, serde_json::Value>> {
    let re = Regex::new(r"(?i)session\s*#?\s*(\d+)").expect("static regex is valid");
    let captures = re.captures(user_input)?;
    let n = captures.get(1)?.as_str();
    let mut filter = HashMap::new();
    filter.insert("session_id".to_string(), serde_json::json!(format!("session-{n}")));
    Some(filter)
}

/// Detects an explicit "remember this" instruction and extracts the content
/// to store (spec.md §8 Scenario 1, ported from
/// `original_source/src/api/routes/chat.py`'s `_REMEMBER_RE` /
/// `_extract_remember_content`: an optional "this/that/these/those/the
/// following" filler and colon after "remember", with the remainder of the
/// message as the content).
fn extract_remember_content(user_input: &str) -> Option<String> {
    let re = Regex::new(
        r"(?is)^remember\s+(?:this|that|these|those|the\s+following|following)?\s*:?\s*(.+)",
    )
    .expect("static regex is valid");
    let captures = re.captures(user_input.trim())?;
    let content = captures.get(1)?.as_str().trim().trim_start_matches(':').trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// Wires every subsystem into the per-request pipeline (spec.md §4.10).
pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    intent_router: Arc<IntentRouter>,
    short_term: Arc<ShortTermMemory>,
    long_term: Arc<LongTermMemory>,
    personality: Arc<PersonalityManager>,
    extensions: Arc<ExtensionRegistry>,
    telemetry: Arc<TelemetryCollector>,
    events: Arc<EventBus>,
    storage: Arc<Storage>,
    pipelines: PipelineStore,
    memory_config: MemoryConfig,
    message_counts: DashMap<String, u64>,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        intent_router: Arc<IntentRouter>,
        short_term: Arc<ShortTermMemory>,
        long_term: Arc<LongTermMemory>,
        personality: Arc<PersonalityManager>,
        extensions: Arc<ExtensionRegistry>,
        telemetry: Arc<TelemetryCollector>,
        events: Arc<EventBus>,
        storage: Arc<Storage>,
        memory_config: MemoryConfig,
    ) -> Self {
        Self {
            registry,
            intent_router,
            short_term,
            long_term,
            personality,
            extensions,
            telemetry,
            events,
            storage,
            pipelines: PipelineStore::new(),
            memory_config,
            message_counts: DashMap::new(),
        }
    }

    #[must_use]
    pub fn pipeline(&self, request_id: &str) -> Option<Pipeline> {
        self.pipelines.get(request_id)
    }

    #[must_use]
    pub fn recent_pipelines(&self, limit: usize) -> Vec<Pipeline> {
        self.pipelines.recent(limit)
    }

    /// Run the full pipeline for one turn, non-streaming (spec.md §4.10
    /// `process`).
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut pipeline = Pipeline::new(request_id.clone());
        let started = std::time::Instant::now();

        let outcome = self.run_pipeline(&request, &request_id, &mut pipeline).await;

        match outcome {
            Ok(response) => {
                pipeline.complete_stage(Stage::Post);
                pipeline.finish();
                self.pipelines.record(pipeline);
                self.record_duration(started, response.intent, Some(response.slot), true);
                self.post_process(&request, &request_id, &response).await;
                Ok(response)
            }
            Err(e) => {
                pipeline.fail(e.to_string());
                self.pipelines.record(pipeline);
                self.record_duration(started, Intent::GeneralConversation, None, false);
                Err(e)
            }
        }
    }

    /// As `process`, but yields generated tokens as they arrive instead of
    /// waiting for the full response (spec.md §4.10 `processStream`, §5
    /// "Streaming").
    pub fn process_stream(
        self: Arc<Self>,
        request: ProcessRequest,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        stream! {
            let request_id = uuid::Uuid::new_v4().to_string();
            let mut pipeline = Pipeline::new(request_id.clone());
            let started = std::time::Instant::now();

            let prelude = match self.run_prelude(&request, &request_id, &mut pipeline).await {
                Ok(p) => p,
                Err(e) => {
                    pipeline.fail(e.to_string());
                    self.pipelines.record(pipeline);
                    yield Err(e);
                    return;
                }
            };

            pipeline.enter_stage(Stage::Llm);
            self.events.publish(RuntimeEvent::StageChanged {
                request_id: request_id.clone(),
                stage: Stage::Llm,
                intent: Some(prelude.intent_result.intent_type),
            });

            let client = match self.registry.get_client(prelude.intent_result.recommended_model).await {
                Ok(c) => c,
                Err(e) => {
                    let e = OrchestratorError::from(e);
                    pipeline.error_stage(Stage::Llm, e.to_string());
                    pipeline.fail(e.to_string());
                    self.pipelines.record(pipeline);
                    yield Err(e);
                    return;
                }
            };

            let overrides = CallOverrides::default();
            let mut full = String::new();
            let mut token_stream = client.stream(prelude.messages.clone(), overrides);

            use futures::StreamExt;
            loop {
                if request.cancel.is_cancelled() {
                    pipeline.fail("cancelled");
                    self.pipelines.record(pipeline);
                    yield Err(OrchestratorError::Cancelled);
                    return;
                }

                let next = tokio::select! {
                    biased;
                    () = request.cancel.cancelled() => {
                        pipeline.fail("cancelled");
                        self.pipelines.record(pipeline);
                        yield Err(OrchestratorError::Cancelled);
                        return;
                    }
                    chunk = token_stream.next() => chunk,
                };

                match next {
                    None => break,
                    Some(Err(e)) => {
                        let e = OrchestratorError::from(e);
                        pipeline.error_stage(Stage::Llm, e.to_string());
                        pipeline.fail(e.to_string());
                        self.pipelines.record(pipeline);
                        yield Err(e);
                        return;
                    }
                    Some(Ok(chunk)) => {
                        if !chunk.content.is_empty() {
                            full.push_str(&chunk.content);
                            self.events.publish(RuntimeEvent::StreamToken {
                                request_id: request_id.clone(),
                                token: chunk.content.clone(),
                            });
                            yield Ok(chunk.content);
                        }
                        if chunk.is_final {
                            self.registry.record_usage(
                                prelude.intent_result.recommended_model,
                                u64::from(chunk.prompt_tokens + chunk.completion_tokens),
                                started.elapsed().as_millis() as u64,
                            );
                            break;
                        }
                    }
                }
            }

            self.events.publish(RuntimeEvent::StreamEnd { request_id: request_id.clone() });
            pipeline.complete_stage(Stage::Llm);
            pipeline.enter_stage(Stage::Post);
            pipeline.complete_stage(Stage::Post);
            pipeline.finish();
            self.pipelines.record(pipeline);
            self.record_duration(started, prelude.intent_result.intent_type, Some(prelude.intent_result.recommended_model), true);

            let response = ProcessResponse {
                request_id: request_id.clone(),
                content: full,
                model: client.model_name().to_string(),
                slot: prelude.intent_result.recommended_model,
                intent: prelude.intent_result.intent_type,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            self.post_process(&request, &request_id, &response).await;
        }
    }

    async fn run_pipeline(
        &self,
        request: &ProcessRequest,
        request_id: &str,
        pipeline: &mut Pipeline,
    ) -> Result<ProcessResponse> {
        let prelude = self.run_prelude(request, request_id, pipeline).await?;

        if request.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        pipeline.enter_stage(Stage::Llm);
        self.events.publish(RuntimeEvent::StageChanged {
            request_id: request_id.to_string(),
            stage: Stage::Llm,
            intent: Some(prelude.intent_result.intent_type),
        });

        let client = self.registry.get_client(prelude.intent_result.recommended_model).await?;
        let started = std::time::Instant::now();
        let generation = client.generate(&prelude.messages, CallOverrides::default()).await;

        let generation = match generation {
            Ok(g) => g,
            Err(e) => {
                let e = OrchestratorError::from(e);
                pipeline.error_stage(Stage::Llm, e.to_string());
                return Err(e);
            }
        };

        self.registry.record_usage(
            prelude.intent_result.recommended_model,
            u64::from(generation.prompt_tokens + generation.completion_tokens),
            started.elapsed().as_millis() as u64,
        );
        pipeline.complete_stage(Stage::Llm);
        pipeline.enter_stage(Stage::Post);

        let response = ProcessResponse {
            request_id: request_id.to_string(),
            content: generation.content,
            model: generation.model,
            slot: prelude.intent_result.recommended_model,
            intent: prelude.intent_result.intent_type,
            duration_ms: generation.duration_ms,
        };

        Ok(response)
    }

    /// Stages 1-3, shared between `process` and `process_stream`: classify
    /// intent, gather memory context, run required extensions, and assemble
    /// the final message list handed to generation (spec.md §4.10 steps
    /// 1-4).
    async fn run_prelude(
        &self,
        request: &ProcessRequest,
        request_id: &str,
        pipeline: &mut Pipeline,
    ) -> Result<Prelude> {
        if let Some(content) = extract_remember_content(&request.user_input) {
            let mut metadata = HashMap::new();
            metadata.insert("session_id".to_string(), serde_json::json!(request.session_id));
            metadata.insert("original_message".to_string(), serde_json::json!(request.user_input));
            match self
                .personality
                .store_explicit(&content, None, Some("explicit_remember".to_string()), metadata)
                .await
            {
                Ok(fragment) => {
                    self.events.publish(RuntimeEvent::PersonalityUpdated {
                        fragment_id: fragment.id,
                        action: "explicit_stored".to_string(),
                    });
                }
                Err(e) => tracing::warn!(error = %e, "failed to store explicit memory"),
            }
        }

        pipeline.enter_stage(Stage::Intent);
        self.events.publish(RuntimeEvent::StageChanged {
            request_id: request_id.to_string(),
            stage: Stage::Intent,
            intent: None,
        });
        let intent_result = self.intent_router.classify(&request.user_input).await;
        pipeline.complete_stage(Stage::Intent);

        pipeline.enter_stage(Stage::Memory);
        let mut messages = vec![Message::user(request.user_input.clone())];
        let mut memory_note = None;

        if intent_result.needs_memory && RetrievalEngine::should_retrieve(&request.user_input, Some(intent_result.intent_type)) {
            let filter = session_reference(&request.user_input);
            let retrieval = RetrievalEngine::retrieve_relevant(
                &self.short_term,
                &self.long_term,
                &request.session_id,
                &request.user_input,
                self.memory_config.retrieval.max_results,
                filter.as_ref(),
            )
            .await;

            match retrieval {
                Ok(context) => {
                    if !context.long_term.is_empty() {
                        memory_note = Some(format_memory_note(&context.long_term, filter.is_some()));
                        self.events.publish(RuntimeEvent::MemoryUpdated {
                            session_id: request.session_id.clone(),
                            long_term_count: context.long_term.len(),
                        });
                    }
                    pipeline.complete_stage(Stage::Memory);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "memory retrieval failed, continuing without it");
                    pipeline.error_stage(Stage::Memory, e.to_string());
                }
            }
        } else {
            pipeline.skip_stage(Stage::Memory);
        }

        if let Some(note) = &memory_note {
            messages.push(Message::system(note.clone()));
        }

        pipeline.enter_stage(Stage::Extension);
        let mut extension_lines = Vec::new();
        if intent_result.required_extensions.is_empty() {
            pipeline.skip_stage(Stage::Extension);
        } else {
            let ctx = ExtensionContext { session_id: request.session_id.clone() };
            let results = self
                .extensions
                .run_all(&intent_result.required_extensions, &request.user_input, &ctx)
                .await;
            for name in &intent_result.required_extensions {
                match results.get(name) {
                    Some(ExtensionOutcome::Output(output)) => {
                        extension_lines.push(format!("- {name}: {output}"));
                        self.events.publish(RuntimeEvent::ExtensionCompleted {
                            request_id: request_id.to_string(),
                            name: name.clone(),
                            ok: true,
                        });
                    }
                    Some(ExtensionOutcome::Error(_)) | None => {
                        self.events.publish(RuntimeEvent::ExtensionCompleted {
                            request_id: request_id.to_string(),
                            name: name.clone(),
                            ok: false,
                        });
                    }
                }
            }
            pipeline.complete_stage(Stage::Extension);
        }

        let personality_block = self.personality.get_personality_block(false).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "personality block unavailable, continuing without it");
            String::new()
        });

        let mode = PromptMode::for_intent(intent_result.intent_type);
        let system_prompt =
            format!("{}\n{}\n{personality_block}", mode.base_prompt(), capabilities_block(&extension_lines));
        messages.insert(0, Message::system(system_prompt));

        Ok(Prelude { intent_result, messages })
    }

    /// Best-effort persistence and learning extraction (spec.md §4.10 step
    /// 5). Failures here are logged, never propagated -- the user-visible
    /// response has already been returned.
    async fn post_process(&self, request: &ProcessRequest, request_id: &str, response: &ProcessResponse) {
        if let Err(e) = self.storage.insert(
            "conversations",
            vec![
                ("id", Value::Text(request_id.to_string())),
                ("session_id", Value::Text(request.session_id.clone())),
                ("user_input", Value::Text(request.user_input.clone())),
                ("assistant_response", Value::Text(response.content.clone())),
                ("model_used", Value::Text(response.model.clone())),
                ("duration_ms", Value::Real(response.duration_ms as f64)),
                ("intent", Value::Text(response.intent.as_str().to_string())),
                ("metadata", Value::Text("{}".to_string())),
                ("created_at", Value::Text(chrono::Utc::now().to_rfc3339())),
            ],
        )
        .await
        {
            tracing::warn!(error = %e, "failed to persist conversation row");
        }

        self.short_term.add(&request.session_id, &request.user_input, Role::User, HashMap::new()).await;
        self.short_term.add(&request.session_id, &response.content, Role::Assistant, HashMap::new()).await;

        let count = {
            let mut entry = self.message_counts.entry(request.session_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.memory_config.long_term.auto_extract
            && count % u64::from(self.memory_config.long_term.extract_interval) == 0
        {
            let conversation_text = format!("USER: {}\nASSISTANT: {}", request.user_input, response.content);
            let learnings = RetrievalEngine::extract_learnings(&conversation_text);
            let mut metadata = HashMap::new();
            metadata.insert("session_id".to_string(), serde_json::json!(request.session_id));
            metadata.insert("origin".to_string(), serde_json::json!("auto_extraction"));
            RetrievalEngine::store_learnings(&self.long_term, &learnings, metadata).await;

            if let Err(e) = self.personality.infer_from_conversation(&conversation_text, Some("auto_extraction".to_string())).await {
                tracing::warn!(error = %e, "personality inference failed");
            }
        }
    }

    fn record_duration(
        &self,
        started: std::time::Instant,
        intent: Intent,
        slot: Option<aegis_types::SlotName>,
        ok: bool,
    ) {
        let mut tags = HashMap::new();
        tags.insert("intent".to_string(), intent.as_str().to_string());
        self.telemetry.record_metric(
            "request.duration_ms",
            started.elapsed().as_millis() as f64,
            tags,
            MetricKind::Histogram,
        );
        self.telemetry.record_metric("requests.total", 1.0, HashMap::new(), MetricKind::Counter);
        if let Some(slot) = slot {
            self.telemetry.record_metric(
                &format!("model.{slot}.requests"),
                1.0,
                HashMap::new(),
                MetricKind::Counter,
            );
        }
        if !ok {
            self.telemetry.record_metric("requests.failed.total", 1.0, HashMap::new(), MetricKind::Counter);
        }
    }
}

struct Prelude {
    intent_result: aegis_types::IntentResult,
    messages: Vec<Message>,
}

fn format_memory_note(memories: &[ScoredLongTermMemory], scoped_to_session: bool) -> String {
    let header = if scoped_to_session {
        "Relevant memories from that session:"
    } else {
        "Relevant memories:"
    };
    let mut lines = vec![header.to_string()];
    for (i, m) in memories.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, m.memory.content));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_reference_extracts_ordinal() {
        let filter = session_reference("what did we discuss in session #3?").unwrap();
        assert_eq!(filter.get("session_id").unwrap(), &serde_json::json!("session-3"));
    }

    #[test]
    fn session_reference_absent_returns_none() {
        assert!(session_reference("what's the weather like").is_none());
    }

    #[test]
    fn extract_remember_content_strips_filler_and_colon() {
        assert_eq!(
            extract_remember_content("remember this: my favorite number is 6").unwrap(),
            "my favorite number is 6"
        );
    }

    #[test]
    fn extract_remember_content_works_without_filler() {
        assert_eq!(extract_remember_content("remember the wifi password is hunter2").unwrap(), "the wifi password is hunter2");
    }

    #[test]
    fn extract_remember_content_absent_returns_none() {
        assert!(extract_remember_content("what's the weather like").is_none());
        assert!(extract_remember_content("remember").is_none());
    }

    #[test]
    fn format_memory_note_numbers_entries() {
        let record = aegis_memory::LongTermMemoryRecord {
            id: "1".to_string(),
            content: "likes tea".to_string(),
            category: None,
            importance: 5,
            embedding: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            access_count: 0,
            last_accessed: None,
            metadata: HashMap::new(),
        };
        let note = format_memory_note(&[ScoredLongTermMemory { memory: record, relevance: 1.0 }], false);
        assert!(note.starts_with("Relevant memories:"));
        assert!(note.contains("1. likes tea"));
    }
}
