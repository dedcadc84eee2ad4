//! `ModelClient`: protocol client to one backend model (spec.md §4.3).

use crate::error::{BackendError, Result};
use crate::protocol::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, GenerateOptions,
    GenerateRequest, GenerateResponse, TagsResponse, WireMessage,
};
use aegis_types::{KeepAlive, Message, Role};
use async_stream::stream;
use futures::Stream;
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// A single generation response (spec.md §4.3 `generate`).
#[derive(Debug, Clone)]
pub struct Response {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub duration_ms: u64,
    pub finish_reason: Option<String>,
}

/// One streamed fragment (spec.md §4.3 `stream`).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub is_final: bool,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Overrides applicable to a single call, layered over the client's
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

/// Client lifecycle state (spec.md §4.3: `unloaded -> loading -> loaded`,
/// with `loading -> unloaded` on failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unloaded,
    Loading,
    Loaded,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Protocol client to one backend-resident model. `state` is a
/// `parking_lot::RwLock` guarding only the enum -- never held across an
/// `.await` point.
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    default_temperature: f32,
    default_max_tokens: u32,
    keep_alive: KeepAlive,
    state: RwLock<ClientState>,
}

impl ModelClient {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        default_temperature: f32,
        default_max_tokens: u32,
        keep_alive: KeepAlive,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            default_temperature,
            default_max_tokens,
            keep_alive,
            state: RwLock::new(ClientState::Unloaded),
        }
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.state.read()
    }

    /// Verify the model exists, send a 1-token warm-up generation, mark
    /// loaded (spec.md §4.3 `load`).
    pub async fn load(&self) -> Result<()> {
        *self.state.write() = ClientState::Loading;

        let exists = self.model_exists().await;
        match exists {
            Ok(true) => {}
            Ok(false) => {
                *self.state.write() = ClientState::Unloaded;
                return Err(BackendError::ModelNotFound(self.model.clone()));
            }
            Err(e) => {
                *self.state.write() = ClientState::Unloaded;
                return Err(e);
            }
        }

        let warmup = GenerateRequest {
            model: self.model.clone(),
            prompt: String::new(),
            stream: false,
            options: GenerateOptions { num_predict: Some(1), temperature: None, stop: None },
            keep_alive: Some(self.keep_alive.to_wire_value()),
        };

        let result = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&warmup)
            .send()
            .await;

        match result {
            Ok(r) if r.status().is_success() => {
                *self.state.write() = ClientState::Loaded;
                Ok(())
            }
            Ok(r) => {
                *self.state.write() = ClientState::Unloaded;
                Err(BackendError::GenerationFailed(format!(
                    "warm-up generation failed with status {}",
                    r.status()
                )))
            }
            Err(e) => {
                *self.state.write() = ClientState::Unloaded;
                Err(BackendError::Connection(e))
            }
        }
    }

    async fn model_exists(&self) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(BackendError::Connection)?;
        let body: TagsResponse = response.json().await.map_err(BackendError::Connection)?;
        Ok(body.models.iter().any(|m| m.name == self.model))
    }

    fn build_chat_request(&self, messages: &[Message], overrides: &CallOverrides, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage { role: role_str(m.role), content: m.content.clone() })
                .collect(),
            stream,
            options: GenerateOptions {
                num_predict: Some(overrides.max_tokens.unwrap_or(self.default_max_tokens)),
                temperature: Some(overrides.temperature.unwrap_or(self.default_temperature)),
                stop: overrides.stop.clone(),
            },
            keep_alive: Some(self.keep_alive.to_wire_value()),
        }
    }

    /// Non-streaming chat completion (spec.md §4.3 `generate`).
    pub async fn generate(&self, messages: &[Message], overrides: CallOverrides) -> Result<Response> {
        let request = self.build_chat_request(messages, &overrides, false);
        let started = Instant::now();

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(BackendError::Connection)?;

        if !response.status().is_success() {
            return Err(BackendError::GenerationFailed(format!(
                "backend returned status {}",
                response.status()
            )));
        }

        let body: ChatResponse = response.json().await.map_err(BackendError::Connection)?;

        Ok(Response {
            content: body.message.content,
            model: self.model.clone(),
            prompt_tokens: body.prompt_eval_count.unwrap_or(0),
            completion_tokens: body.eval_count.unwrap_or(0),
            duration_ms: started.elapsed().as_millis() as u64,
            finish_reason: body.done_reason,
        })
    }

    /// Streaming chat completion: a finite, not-restartable stream of
    /// newline-delimited JSON chunks with a synthesized final `isFinal`
    /// chunk carrying usage metadata (spec.md §4.3 `stream`, §6).
    pub fn stream(
        &self,
        messages: Vec<Message>,
        overrides: CallOverrides,
    ) -> impl Stream<Item = Result<Chunk>> + Send + 'static {
        let request = self.build_chat_request(&messages, &overrides, true);
        let http = self.http.clone();
        let url = format!("{}/api/chat", self.base_url);

        stream! {
            let response = match http.post(&url).json(&request).send().await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(BackendError::Connection(e));
                    return;
                }
            };

            if !response.status().is_success() {
                yield Err(BackendError::GenerationFailed(format!(
                    "backend returned status {}",
                    response.status()
                )));
                return;
            }

            let mut buf = String::new();
            let mut body = response.bytes_stream();
            let mut last_prompt_tokens = 0u32;
            let mut last_completion_tokens = 0u32;

            use futures::StreamExt;
            while let Some(bytes) = body.next().await {
                let bytes = match bytes {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(BackendError::Connection(e));
                        return;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }

                    let parsed: ChatResponse = match serde_json::from_str(&line) {
                        Ok(p) => p,
                        Err(_) => continue,
                    };

                    last_prompt_tokens = parsed.prompt_eval_count.unwrap_or(last_prompt_tokens);
                    last_completion_tokens = parsed.eval_count.unwrap_or(last_completion_tokens);

                    if parsed.done {
                        yield Ok(Chunk {
                            content: parsed.message.content,
                            is_final: true,
                            prompt_tokens: last_prompt_tokens,
                            completion_tokens: last_completion_tokens,
                        });
                        return;
                    }

                    yield Ok(Chunk {
                        content: parsed.message.content,
                        is_final: false,
                        prompt_tokens: 0,
                        completion_tokens: 0,
                    });
                }
            }

            yield Ok(Chunk {
                content: String::new(),
                is_final: true,
                prompt_tokens: last_prompt_tokens,
                completion_tokens: last_completion_tokens,
            });
        }
    }

    /// Embed `text` via the backend's embeddings endpoint (spec.md §4.3
    /// `embed`).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest { model: self.model.clone(), prompt: text.to_string() };
        let response = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(BackendError::Connection)?;
        let body: EmbeddingsResponse = response.json().await.map_err(BackendError::Connection)?;
        Ok(body.embedding)
    }

    /// Liveness probe (spec.md §4.3 `healthCheck`).
    pub async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Release transport resources. Idempotent (spec.md §4.3 `unload`).
    pub fn unload(&self) {
        *self.state.write() = ClientState::Unloaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn initial_state_is_unloaded() {
        let client = ModelClient::new("http://localhost:11434", "llama3", 0.7, 512, KeepAlive::default());
        assert_eq!(client.state(), ClientState::Unloaded);
    }

    #[test]
    fn unload_is_idempotent() {
        let client = ModelClient::new("http://localhost:11434", "llama3", 0.7, 512, KeepAlive::default());
        client.unload();
        client.unload();
        assert_eq!(client.state(), ClientState::Unloaded);
    }

    #[test]
    fn role_str_matches_wire_protocol() {
        assert_eq!(role_str(Role::System), "system");
        assert_eq!(role_str(Role::User), "user");
        assert_eq!(role_str(Role::Assistant), "assistant");
    }

    fn client_for(server: &MockServer) -> ModelClient {
        ModelClient::new(server.uri(), "llama3", 0.7, 512, KeepAlive::default())
    }

    #[tokio::test]
    async fn load_marks_loaded_after_tags_and_warmup_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "", "done": true
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.load().await.unwrap();
        assert_eq!(client.state(), ClientState::Loaded);
    }

    #[tokio::test]
    async fn load_fails_when_model_not_in_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "some-other-model"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.load().await.unwrap_err();
        assert!(matches!(err, BackendError::ModelNotFound(m) if m == "llama3"));
        assert_eq!(client.state(), ClientState::Unloaded);
    }

    #[tokio::test]
    async fn load_fails_when_warmup_generation_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.load().await.is_err());
        assert_eq!(client.state(), ClientState::Unloaded);
    }

    #[tokio::test]
    async fn generate_parses_chat_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"content": "hello there"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 5,
                "eval_count": 3
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client.generate(&[Message::user("hi")], CallOverrides::default()).await.unwrap();
        assert_eq!(response.content, "hello there");
        assert_eq!(response.prompt_tokens, 5);
        assert_eq!(response.completion_tokens, 3);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn generate_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.generate(&[Message::user("hi")], CallOverrides::default()).await.unwrap_err();
        assert!(matches!(err, BackendError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn stream_parses_ndjson_and_synthesizes_final_chunk() {
        let server = MockServer::start().await;
        let body = "{\"message\":{\"content\":\"hel\"},\"done\":false}\n\
             {\"message\":{\"content\":\"lo\"},\"done\":false}\n\
             {\"message\":{\"content\":\"\"},\"done\":true,\"prompt_eval_count\":7,\"eval_count\":2}\n";
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let chunks: Vec<Chunk> = client
            .stream(vec![Message::user("hi")], CallOverrides::default())
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "hel");
        assert!(!chunks[0].is_final);
        assert_eq!(chunks[1].content, "lo");
        assert!(chunks[2].is_final);
        assert_eq!(chunks[2].prompt_tokens, 7);
        assert_eq!(chunks[2].completion_tokens, 2);
    }

    #[tokio::test]
    async fn stream_yields_only_synthesized_final_chunk_when_body_never_reports_done() {
        let server = MockServer::start().await;
        let body = "{\"message\":{\"content\":\"partial\"},\"done\":false}\n";
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let chunks: Vec<Chunk> = client
            .stream(vec![Message::user("hi")], CallOverrides::default())
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].is_final);
        assert!(chunks[1].is_final);
        assert!(chunks[1].content.is_empty());
    }

    #[tokio::test]
    async fn embed_returns_embedding_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.1, 0.2, 0.3]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let embedding = client.embed("some text").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn health_check_true_on_success_false_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;
        let healthy_client = client_for(&server);
        assert!(healthy_client.health_check().await);

        let unreachable_client = ModelClient::new("http://127.0.0.1:1", "llama3", 0.7, 512, KeepAlive::default());
        assert!(!unreachable_client.health_check().await);
    }
}
