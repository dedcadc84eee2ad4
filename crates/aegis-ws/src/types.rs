//! Wire types for the WebSocket fan-out (spec.md §4.12, §6 "WebSocket
//! message format").

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A subscribable broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Processing,
    Logs,
    Memory,
    Personality,
}

impl Channel {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Channel::Processing),
            "logs" => Some(Channel::Logs),
            "memory" => Some(Channel::Memory),
            "personality" => Some(Channel::Personality),
            _ => None,
        }
    }
}

/// Default subscription set for a freshly registered connection (spec.md
/// §4.12).
#[must_use]
pub fn default_subscriptions() -> HashSet<Channel> {
    [Channel::Processing, Channel::Logs].into_iter().collect()
}

/// Server-to-client event type (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Connected,
    ProcessingUpdate,
    StreamToken,
    StreamEnd,
    MemoryUpdate,
    ExtensionUpdate,
    PersonalityUpdate,
    Log,
    Error,
    Pong,
}

impl EventType {
    /// The channel this event type is broadcast on, if it is
    /// channel-scoped. `Connected`/`Pong` are sent directly to one
    /// connection and never broadcast.
    #[must_use]
    pub fn channel(self) -> Option<Channel> {
        match self {
            EventType::ProcessingUpdate | EventType::StreamToken | EventType::StreamEnd => {
                Some(Channel::Processing)
            }
            EventType::MemoryUpdate => Some(Channel::Memory),
            EventType::PersonalityUpdate | EventType::ExtensionUpdate => Some(Channel::Personality),
            EventType::Log | EventType::Error => Some(Channel::Logs),
            EventType::Connected | EventType::Pong => None,
        }
    }
}

/// A server-to-client message: `{type, data, timestamp}` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl WsEvent {
    #[must_use]
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self { event_type, data, timestamp: chrono::Utc::now().to_rfc3339() }
    }
}

/// Client-to-server control message (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Ping,
}
