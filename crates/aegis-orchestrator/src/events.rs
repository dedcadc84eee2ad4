//! Typed runtime event bus, fanned out over `aegis-ws` (SPEC_FULL.md §9
//! REDESIGN FLAGS: a closed `RuntimeEvent` enum replaces the teacher's
//! callback-chain dispatch -- every event the orchestrator can emit is
//! enumerated here instead of being whatever shape a registered callback
//! happened to expect).

use aegis_types::{Intent, Stage};
use aegis_ws::{Channel, EventType, WSFanout, WsEvent};
use serde_json::json;
use std::sync::Arc;

/// Every event the orchestrator can publish over the lifetime of a request.
/// Each variant maps to exactly one `aegis_ws::EventType` and carries the
/// data that type's `data` field serializes.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    StageChanged { request_id: String, stage: Stage, intent: Option<Intent> },
    StreamToken { request_id: String, token: String },
    StreamEnd { request_id: String },
    MemoryUpdated { session_id: String, long_term_count: usize },
    ExtensionCompleted { request_id: String, name: String, ok: bool },
    PersonalityUpdated { fragment_id: String, action: String },
    Logged { level: String, message: String },
    Errored { request_id: Option<String>, code: String, message: String },
}

/// Thin wrapper translating `RuntimeEvent`s into `aegis_ws::WsEvent`s and
/// publishing them over the fanout. Kept as its own type (rather than
/// handing the orchestrator `Arc<WSFanout>` directly) so the mapping from
/// domain event to wire event lives in one place.
pub struct EventBus {
    fanout: Arc<WSFanout>,
}

impl EventBus {
    #[must_use]
    pub fn new(fanout: Arc<WSFanout>) -> Self {
        Self { fanout }
    }

    pub fn publish(&self, event: RuntimeEvent) {
        let (event_type, data) = match event {
            RuntimeEvent::StageChanged { request_id, stage, intent } => (
                EventType::ProcessingUpdate,
                json!({ "request_id": request_id, "stage": stage.to_string(), "intent": intent.map(|i| i.as_str()) }),
            ),
            RuntimeEvent::StreamToken { request_id, token } => {
                (EventType::StreamToken, json!({ "request_id": request_id, "token": token }))
            }
            RuntimeEvent::StreamEnd { request_id } => {
                (EventType::StreamEnd, json!({ "request_id": request_id }))
            }
            RuntimeEvent::MemoryUpdated { session_id, long_term_count } => (
                EventType::MemoryUpdate,
                json!({ "session_id": session_id, "long_term_count": long_term_count }),
            ),
            RuntimeEvent::ExtensionCompleted { request_id, name, ok } => (
                EventType::ExtensionUpdate,
                json!({ "request_id": request_id, "extension": name, "ok": ok }),
            ),
            RuntimeEvent::PersonalityUpdated { fragment_id, action } => (
                EventType::PersonalityUpdate,
                json!({ "fragment_id": fragment_id, "action": action }),
            ),
            RuntimeEvent::Logged { level, message } => {
                (EventType::Log, json!({ "level": level, "message": message }))
            }
            RuntimeEvent::Errored { request_id, code, message } => {
                (EventType::Error, json!({ "request_id": request_id, "code": code, "message": message }))
            }
        };

        let channel = event_type.channel().unwrap_or(Channel::Logs);
        self.fanout.broadcast(WsEvent::new(event_type, data), Some(channel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_changed_publishes_on_processing_channel() {
        let fanout = Arc::new(WSFanout::new(10));
        let (_id, mut rx) = fanout.register().unwrap();
        let bus = EventBus::new(fanout);

        bus.publish(RuntimeEvent::StageChanged {
            request_id: "r1".to_string(),
            stage: Stage::Intent,
            intent: Some(Intent::Question),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_type, EventType::ProcessingUpdate);
    }

    #[test]
    fn logged_publishes_on_logs_channel() {
        let fanout = Arc::new(WSFanout::new(10));
        let (_id, mut rx) = fanout.register().unwrap();
        let bus = EventBus::new(fanout);

        bus.publish(RuntimeEvent::Logged { level: "warn".to_string(), message: "hi".to_string() });
        assert!(rx.try_recv().is_ok());
    }
}
