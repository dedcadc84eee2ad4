//! `ClientConnection`: transport handle, id, and subscription set (spec.md
//! §4.12).

use crate::types::{default_subscriptions, Channel, WsEvent};
use parking_lot::RwLock;
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One subscriber. The subscriber-side half of `sender` is owned by
/// whatever transport (axum `ws` socket, test harness) reads messages off
/// it and pushes them to the wire.
pub struct ClientConnection {
    id: Uuid,
    sender: mpsc::UnboundedSender<WsEvent>,
    subscriptions: RwLock<HashSet<Channel>>,
}

impl ClientConnection {
    pub(crate) fn new(id: Uuid, sender: mpsc::UnboundedSender<WsEvent>) -> Self {
        Self { id, sender, subscriptions: RwLock::new(default_subscriptions()) }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enqueue `event` for delivery. Returns `false` if the receiving half
    /// has been dropped (the transport disconnected) -- the fanout treats
    /// this as a failure and evicts the connection.
    pub fn send(&self, event: WsEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    #[must_use]
    pub fn is_subscribed(&self, channel: Channel) -> bool {
        self.subscriptions.read().contains(&channel)
    }

    pub fn subscribe(&self, channels: &[Channel]) {
        self.subscriptions.write().extend(channels.iter().copied());
    }

    pub fn unsubscribe(&self, channels: &[Channel]) {
        let mut subs = self.subscriptions.write();
        for channel in channels {
            subs.remove(channel);
        }
    }
}
