//! `WSFanout`: channel-based broadcast with per-connection failure eviction
//! (spec.md §4.12). Modeled on `dashflow-observability`'s `websocket_server`
//! (`ServerState`'s per-connection subscription bookkeeping and
//! send-failure handling), but registers a dedicated `mpsc` channel per
//! connection rather than one shared `broadcast` channel, since the spec
//! requires per-subscriber send-failure detection that a fan-in
//! `broadcast::Sender` (which only reports failure when *zero* receivers
//! remain) cannot express.

use crate::connection::ClientConnection;
use crate::error::{Result, WsError};
use crate::types::{Channel, ClientMessage, EventType, WsEvent};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel-based broadcast to subscribed observers (spec.md §4.12). One
/// lock-free map of connections; eviction and subscription updates are
/// wait-free reads/writes guarded per-connection, never globally.
pub struct WSFanout {
    connections: DashMap<Uuid, Arc<ClientConnection>>,
    max_connections: usize,
    connection_count: AtomicUsize,
}

impl WSFanout {
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self { connections: DashMap::new(), max_connections, connection_count: AtomicUsize::new(0) }
    }

    /// Register a new subscriber. Refuses over the connection cap (spec.md
    /// §4.12 "over-cap connects are refused with a close reason").
    pub fn register(&self) -> Result<(Uuid, mpsc::UnboundedReceiver<WsEvent>)> {
        if self.connection_count.load(Ordering::SeqCst) >= self.max_connections {
            return Err(WsError::ConnectionLimitReached(self.max_connections));
        }

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, Arc::new(ClientConnection::new(id, tx)));
        self.connection_count.fetch_add(1, Ordering::SeqCst);
        Ok((id, rx))
    }

    pub fn unregister(&self, id: Uuid) {
        if self.connections.remove(&id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::SeqCst)
    }

    /// Send directly to one connection (used for the `connected` greeting
    /// and `pong` replies, neither of which is broadcast).
    pub fn send_to(&self, id: Uuid, event: WsEvent) -> bool {
        match self.connections.get(&id) {
            Some(conn) => {
                let ok = conn.send(event);
                if !ok {
                    drop(conn);
                    self.unregister(id);
                }
                ok
            }
            None => false,
        }
    }

    /// Broadcast to every connection subscribed to `channel` (or to every
    /// connection at all, if `channel` is `None`). Disconnects any
    /// subscriber whose send fails (spec.md §4.12). Returns the number of
    /// successful sends.
    pub fn broadcast(&self, event: WsEvent, channel: Option<Channel>) -> usize {
        let mut delivered = 0usize;
        let mut failed = Vec::new();

        for entry in self.connections.iter() {
            let conn = entry.value();
            if let Some(channel) = channel {
                if !conn.is_subscribed(channel) {
                    continue;
                }
            }
            if conn.send(event.clone()) {
                delivered += 1;
            } else {
                failed.push(conn.id());
            }
        }

        for id in failed {
            self.unregister(id);
        }

        delivered
    }

    /// Apply a client-to-server control message, returning a direct reply
    /// event if one is owed (`ping` -> `pong`); subscribe/unsubscribe
    /// mutate the connection's set in place and reply with nothing.
    pub fn handle_client_message(&self, id: Uuid, message: ClientMessage) -> Option<WsEvent> {
        let Some(conn) = self.connections.get(&id) else {
            return None;
        };

        match message {
            ClientMessage::Ping => Some(WsEvent::new(EventType::Pong, serde_json::Value::Null)),
            ClientMessage::Subscribe { channels } => {
                let parsed: Vec<Channel> = channels.iter().filter_map(|c| Channel::parse(c)).collect();
                conn.subscribe(&parsed);
                None
            }
            ClientMessage::Unsubscribe { channels } => {
                let parsed: Vec<Channel> = channels.iter().filter_map(|c| Channel::parse(c)).collect();
                conn.unsubscribe(&parsed);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_up_to_the_connection_cap_then_refuses() {
        let fanout = WSFanout::new(1);
        assert!(fanout.register().is_ok());
        assert!(matches!(fanout.register(), Err(WsError::ConnectionLimitReached(1))));
    }

    #[test]
    fn unregister_frees_a_cap_slot() {
        let fanout = WSFanout::new(1);
        let (id, _rx) = fanout.register().unwrap();
        fanout.unregister(id);
        assert!(fanout.register().is_ok());
    }

    #[test]
    fn broadcast_respects_default_subscription_set() {
        let fanout = WSFanout::new(10);
        let (_id, mut rx) = fanout.register().unwrap();

        let delivered = fanout.broadcast(WsEvent::new(EventType::MemoryUpdate, serde_json::json!({})), Some(Channel::Memory));
        assert_eq!(delivered, 0, "memory is not in the default subscription set");

        let delivered = fanout.broadcast(
            WsEvent::new(EventType::ProcessingUpdate, serde_json::json!({})),
            Some(Channel::Processing),
        );
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn dropped_receiver_is_evicted_on_next_broadcast() {
        let fanout = WSFanout::new(10);
        let (_id, rx) = fanout.register().unwrap();
        drop(rx);

        let delivered = fanout.broadcast(
            WsEvent::new(EventType::ProcessingUpdate, serde_json::json!({})),
            Some(Channel::Processing),
        );
        assert_eq!(delivered, 0);
        assert_eq!(fanout.connection_count(), 0);
    }

    #[test]
    fn ping_replies_with_pong() {
        let fanout = WSFanout::new(10);
        let (id, _rx) = fanout.register().unwrap();
        let reply = fanout.handle_client_message(id, ClientMessage::Ping);
        assert!(matches!(reply, Some(WsEvent { event_type: EventType::Pong, .. })));
    }

    #[test]
    fn subscribe_adds_a_channel_not_in_the_default_set() {
        let fanout = WSFanout::new(10);
        let (id, mut rx) = fanout.register().unwrap();
        fanout.handle_client_message(id, ClientMessage::Subscribe { channels: vec!["memory".to_string()] });

        let delivered = fanout.broadcast(WsEvent::new(EventType::MemoryUpdate, serde_json::json!({})), Some(Channel::Memory));
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
    }
}
