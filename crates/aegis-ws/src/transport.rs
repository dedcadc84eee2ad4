//! Wire-level conversions to/from `axum`'s WebSocket `Message` type. The
//! socket accept loop and HTTP upgrade handshake are boilerplate left to
//! the caller (spec.md §1 Non-goals: "HTTP handler boilerplate"); this
//! module only owns the encode/decode step, mirroring
//! `dashflow-observability`'s `websocket_server` handlers.

use crate::types::{ClientMessage, WsEvent};
use axum::extract::ws::Message;

/// Serialize an outbound event as a text frame.
#[must_use]
pub fn encode(event: &WsEvent) -> Message {
    Message::Text(serde_json::to_string(event).unwrap_or_default())
}

/// Parse an inbound frame into a client control message. Non-text frames
/// and malformed JSON are ignored (returns `None`) rather than closing the
/// connection.
#[must_use]
pub fn decode(message: &Message) -> Option<ClientMessage> {
    match message {
        Message::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;

    #[test]
    fn encode_produces_a_text_frame() {
        let event = WsEvent::new(EventType::Pong, serde_json::Value::Null);
        assert!(matches!(encode(&event), Message::Text(_)));
    }

    #[test]
    fn decode_parses_ping() {
        let msg = Message::Text(r#"{"type":"ping"}"#.to_string());
        assert!(matches!(decode(&msg), Some(ClientMessage::Ping)));
    }

    #[test]
    fn decode_ignores_non_text_frames() {
        assert!(decode(&Message::Binary(vec![1, 2, 3])).is_none());
    }
}
