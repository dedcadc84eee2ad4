//! `ShortTermMemory`: per-session FIFO buffer with TTL expiry (spec.md §4.6).
//!
//! Each session gets its own `tokio::sync::Mutex`-guarded buffer so
//! insertions for one session serialize without blocking any other session
//! (spec.md §5 "Locking discipline": "ShortTermMemory: per-session lock").
//! Writes are mirrored into `aegis-storage`'s `short_term_memory` table on a
//! best-effort basis -- a persistence failure is logged, never propagated,
//! matching spec.md §7's "conversation persistence errors never fail the
//! user-visible response" policy extended to this table.

use crate::error::Result;
use aegis_storage::Storage;
use aegis_types::Role;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One buffered item (spec.md §3 "ShortTermItem").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermItem {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ShortTermItem {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

struct SessionBuffer {
    items: Mutex<VecDeque<ShortTermItem>>,
}

/// Per-session FIFO buffer with TTL expiry (spec.md §4.6).
///
/// Invariant: `count(session) <= max_messages`; on overflow the oldest item
/// is evicted first. Expired items are dropped lazily on read.
pub struct ShortTermMemory {
    storage: Arc<Storage>,
    max_messages: usize,
    ttl: ChronoDuration,
    sessions: DashMap<String, Arc<SessionBuffer>>,
}

impl ShortTermMemory {
    #[must_use]
    pub fn new(storage: Arc<Storage>, max_messages: usize, ttl_secs: u64) -> Self {
        Self {
            storage,
            max_messages,
            ttl: ChronoDuration::seconds(ttl_secs as i64),
            sessions: DashMap::new(),
        }
    }

    fn buffer_for(&self, session: &str) -> Arc<SessionBuffer> {
        self.sessions
            .entry(session.to_string())
            .or_insert_with(|| Arc::new(SessionBuffer { items: Mutex::new(VecDeque::new()) }))
            .clone()
    }

    /// Append a new item, evict expired items, then enforce `max_messages`
    /// by dropping from the head (spec.md §4.6 `add`).
    pub async fn add(
        &self,
        session: &str,
        content: &str,
        role: Role,
        metadata: HashMap<String, serde_json::Value>,
    ) -> ShortTermItem {
        let now = Utc::now();
        let item = ShortTermItem {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.to_string(),
            role,
            content: content.to_string(),
            metadata,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let buffer = self.buffer_for(session);
        {
            let mut items = buffer.items.lock().await;
            items.push_back(item.clone());
            items.retain(|i| !i.is_expired(now));
            while items.len() > self.max_messages {
                items.pop_front();
            }
        }

        if let Err(e) = self.persist(&item).await {
            tracing::warn!(session_id = %session, error = %e, "failed to persist short-term item");
        }

        item
    }

    async fn persist(&self, item: &ShortTermItem) -> Result<()> {
        self.storage
            .insert(
                "short_term_memory",
                vec![
                    ("id", Value::Text(item.id.clone())),
                    ("session_id", Value::Text(item.session_id.clone())),
                    ("role", Value::Text(role_wire(item.role).to_string())),
                    ("content", Value::Text(item.content.clone())),
                    (
                        "metadata",
                        Value::Text(serde_json::to_string(&item.metadata).unwrap_or_default()),
                    ),
                    ("created_at", Value::Text(item.created_at.to_rfc3339())),
                    ("expires_at", Value::Text(item.expires_at.to_rfc3339())),
                ],
            )
            .await?;
        Ok(())
    }

    /// Evict expired items, return the remainder in insertion order
    /// (spec.md §4.6 `getAll`).
    pub async fn get_all(&self, session: &str) -> Vec<ShortTermItem> {
        let Some(buffer) = self.sessions.get(session).map(|b| b.clone()) else {
            return Vec::new();
        };
        let now = Utc::now();
        let mut items = buffer.items.lock().await;
        items.retain(|i| !i.is_expired(now));
        items.iter().cloned().collect()
    }

    /// Formatted `ROLE: content` lines, newest `limit` or all (spec.md §4.6
    /// `getContext`).
    pub async fn get_context(&self, session: &str, limit: Option<usize>) -> String {
        let items = self.get_all(session).await;
        let slice: Vec<&ShortTermItem> = match limit {
            Some(n) if n < items.len() => items[items.len() - n..].iter().collect(),
            _ => items.iter().collect(),
        };
        slice.iter().map(|i| format!("{}: {}", i.role.label(), i.content)).collect::<Vec<_>>().join("\n")
    }

    /// Drop the whole session buffer, returning how many items it held
    /// (spec.md §4.6 `clear`).
    pub async fn clear(&self, session: &str) -> usize {
        let Some((_, buffer)) = self.sessions.remove(session) else {
            return 0;
        };
        let items = buffer.items.lock().await;
        items.len()
    }
}

fn role_wire(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory(max_messages: usize, ttl_secs: u64) -> ShortTermMemory {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("test.db"), 2).await.unwrap());
        // Keep the tempdir alive for the duration of the test by leaking it;
        // these are short-lived unit tests run in an isolated process.
        std::mem::forget(dir);
        ShortTermMemory::new(storage, max_messages, ttl_secs)
    }

    #[tokio::test]
    async fn fifo_eviction_at_capacity() {
        let mem = memory(3, 3600).await;
        for c in ["A", "B", "C", "D"] {
            mem.add("s1", c, Role::User, HashMap::new()).await;
        }
        let items = mem.get_all("s1").await;
        let contents: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["B", "C", "D"]);
    }

    #[tokio::test]
    async fn insertion_order_preserved() {
        let mem = memory(20, 3600).await;
        mem.add("s1", "first", Role::User, HashMap::new()).await;
        mem.add("s1", "second", Role::Assistant, HashMap::new()).await;
        let items = mem.get_all("s1").await;
        assert_eq!(items[0].content, "first");
        assert_eq!(items[1].content, "second");
    }

    #[tokio::test]
    async fn clear_returns_count_and_empties_session() {
        let mem = memory(20, 3600).await;
        mem.add("s1", "a", Role::User, HashMap::new()).await;
        mem.add("s1", "b", Role::User, HashMap::new()).await;
        assert_eq!(mem.clear("s1").await, 2);
        assert!(mem.get_all("s1").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_yields_empty() {
        let mem = memory(20, 3600).await;
        assert!(mem.get_all("never-seen").await.is_empty());
        assert_eq!(mem.clear("never-seen").await, 0);
    }

    #[tokio::test]
    async fn expired_items_are_invisible_on_read() {
        let mem = memory(20, 0).await;
        mem.add("s1", "stale", Role::User, HashMap::new()).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(mem.get_all("s1").await.is_empty());
    }
}
