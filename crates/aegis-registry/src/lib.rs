//! `ModelRegistry`: named model slots, per-client load locks, and the
//! router↔fast interlock (spec.md §4.4).
//!
//! Grounded directly in `original_source/src/llm/models/model_registry.py`:
//! `ModelInfo`'s usage fields, `initialize()`'s register-then-load-fast
//! sequence, and the router pre-warm step that shares the fast client
//! instead of loading a second one. Per REDESIGN FLAGS, the interlock is
//! reified structurally: `clients[i]` is the one `ModelClient` a slot index
//! may point to, and `slots: HashMap<SlotName, usize>` lets `Router` and
//! `Fast` point at the same index rather than relying on reference-identity
//! comparisons at call sites.

pub mod error;
pub mod stats;

pub use error::{RegistryError, Result};
pub use stats::{ModelStats, RegistryStats};

use aegis_backend::ModelClient;
use aegis_config::LlmConfig;
use aegis_types::SlotName;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Usage counters for one underlying client, indexed in parallel with
/// `ModelRegistry::clients`. Atomics so `record_usage` never needs a lock
/// (spec.md §4.4 `recordUsage`: "atomic increments").
struct ClientUsage {
    use_count: AtomicU64,
    total_tokens: AtomicU64,
    /// Milliseconds, accumulated as an integer to stay atomic.
    total_duration_ms: AtomicU64,
    last_used: SyncMutex<Option<DateTime<Utc>>>,
}

impl ClientUsage {
    fn new() -> Self {
        Self {
            use_count: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            last_used: SyncMutex::new(None),
        }
    }

    fn record(&self, tokens: u64, duration_ms: u64) {
        self.use_count.fetch_add(1, Ordering::Relaxed);
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        *self.last_used.lock() = Some(Utc::now());
    }

    fn snapshot(&self) -> (u64, u64, u64, Option<DateTime<Utc>>) {
        (
            self.use_count.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
            self.total_duration_ms.load(Ordering::Relaxed),
            *self.last_used.lock(),
        )
    }
}

/// Registers named model slots {fast, critical, code, reasoning, router}
/// declared by configuration, with the router↔fast interlock (spec.md
/// §4.4).
pub struct ModelRegistry {
    clients: Vec<Arc<ModelClient>>,
    usage: Vec<ClientUsage>,
    load_locks: Vec<AsyncMutex<()>>,
    slots: HashMap<SlotName, usize>,
    active_slot: SyncMutex<Option<SlotName>>,
    last_switch: SyncMutex<Option<DateTime<Utc>>>,
    switch_lock: AsyncMutex<()>,
}

impl ModelRegistry {
    /// Register every non-router slot from `config`, load the fast slot,
    /// and assign the fast slot's client to the router slot (spec.md §4.4
    /// `initialize`).
    pub async fn initialize(config: &LlmConfig) -> Result<Self> {
        let mut clients = Vec::new();
        let mut usage = Vec::new();
        let mut load_locks = Vec::new();
        let mut slots = HashMap::new();

        for slot in [SlotName::Fast, SlotName::Critical, SlotName::Code, SlotName::Reasoning] {
            let Some(model_config) = config.models.get(&slot) else {
                continue;
            };
            let client = Arc::new(ModelClient::new(
                config.base_url.clone(),
                model_config.name.clone(),
                model_config.temperature,
                model_config.max_tokens,
                config.keep_alive,
            ));
            let index = clients.len();
            clients.push(client);
            usage.push(ClientUsage::new());
            load_locks.push(AsyncMutex::new(()));
            slots.insert(slot, index);
            tracing::debug!(%slot, model = %model_config.name, "registered model slot");
        }

        match slots.get(&SlotName::Fast).copied() {
            Some(fast_index) => {
                if let Err(e) = clients[fast_index].load().await {
                    tracing::warn!(error = %e, "fast slot failed to load at startup");
                }
                // Router shares the fast slot's client and lock -- never a
                // separate load (spec.md §4.4 interlock).
                slots.insert(SlotName::Router, fast_index);
                tracing::info!("router slot shares client with fast slot");
            }
            None => {
                tracing::warn!("fast slot not configured; router slot is unavailable");
            }
        }

        tracing::info!(slots = slots.len(), "model registry initialized");

        Ok(Self {
            clients,
            usage,
            load_locks,
            slots,
            active_slot: SyncMutex::new(None),
            last_switch: SyncMutex::new(None),
            switch_lock: AsyncMutex::new(()),
        })
    }

    async fn load_index(&self, index: usize) -> aegis_backend::Result<()> {
        let _guard = self.load_locks[index].lock().await;
        if self.clients[index].state() == aegis_backend::ClientState::Loaded {
            return Ok(());
        }
        self.clients[index].load().await
    }

    fn index_for(&self, slot: SlotName) -> Result<usize> {
        self.slots.get(&slot).copied().ok_or(RegistryError::SlotNotConfigured(slot))
    }

    /// Return the loaded client for `slot`, loading it first if necessary.
    /// Concurrent callers deduplicate on the per-client load lock (spec.md
    /// §4.4 `getClient`).
    pub async fn get_client(&self, slot: SlotName) -> Result<Arc<ModelClient>> {
        let index = self.index_for(slot)?;
        if self.clients[index].state() != aegis_backend::ClientState::Loaded {
            self.load_index(index).await.map_err(|source| RegistryError::Backend { slot, source })?;
        }
        Ok(self.clients[index].clone())
    }

    /// Whether `slot`'s client is already loaded, without triggering a load
    /// attempt (spec.md §4.4 interlock: lets a caller avoid re-entering
    /// `load_index` on a shared client it already knows is failing).
    #[must_use]
    pub fn is_loaded(&self, slot: SlotName) -> bool {
        match self.index_for(slot) {
            Ok(index) => self.clients[index].state() == aegis_backend::ClientState::Loaded,
            Err(_) => false,
        }
    }

    /// As `get_client`, but also updates the active-slot pointer under the
    /// registry-wide switch lock (spec.md §4.4 `switchTo`).
    pub async fn switch_to(&self, slot: SlotName) -> Result<Arc<ModelClient>> {
        let _switch_guard = self.switch_lock.lock().await;
        let client = self.get_client(slot).await?;
        *self.active_slot.lock() = Some(slot);
        *self.last_switch.lock() = Some(Utc::now());
        tracing::info!(%slot, model = %client.model_name(), "switched active model slot");
        Ok(client)
    }

    /// Atomic usage increment (spec.md §4.4 `recordUsage`).
    pub fn record_usage(&self, slot: SlotName, tokens: u64, duration_ms: u64) {
        if let Ok(index) = self.index_for(slot) {
            self.usage[index].record(tokens, duration_ms);
        }
    }

    /// Per-slot use count, average duration, and last-used timestamp
    /// (spec.md §4.4 `stats`).
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let models = self
            .slots
            .iter()
            .map(|(slot, &index)| {
                let (use_count, total_tokens, total_duration_ms, last_used) =
                    self.usage[index].snapshot();
                let avg_duration_ms = if use_count > 0 {
                    total_duration_ms as f64 / use_count as f64
                } else {
                    0.0
                };
                (
                    *slot,
                    ModelStats {
                        model_name: self.clients[index].model_name().to_string(),
                        use_count,
                        total_tokens,
                        avg_duration_ms,
                        last_used,
                    },
                )
            })
            .collect();

        RegistryStats {
            active_slot: *self.active_slot.lock(),
            last_switch: *self.last_switch.lock(),
            models,
        }
    }

    /// Health check, deduplicated by client identity so the router/fast
    /// interlock never probes the same client twice (spec.md §4.4
    /// `healthCheck`).
    pub async fn health_check(&self) -> HashMap<SlotName, bool> {
        let mut by_client: HashMap<usize, bool> = HashMap::new();
        for &index in self.unique_indices() {
            let ok = self.clients[index].health_check().await;
            by_client.insert(index, ok);
        }
        self.slots.iter().map(|(&slot, &index)| (slot, by_client[&index])).collect()
    }

    /// Unload each unique client exactly once (spec.md §4.4 `shutdown`).
    pub fn shutdown(&self) {
        for &index in self.unique_indices() {
            self.clients[index].unload();
        }
        tracing::info!("model registry shutdown complete");
    }

    fn unique_indices(&self) -> Vec<&usize> {
        let mut seen = std::collections::HashSet::new();
        self.slots.values().filter(|i| seen.insert(**i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_config::ModelSlotConfig;
    use aegis_types::KeepAlive;

    fn config_with_fast_only() -> LlmConfig {
        let mut config = LlmConfig {
            base_url: "http://localhost:11434".to_string(),
            timeout: std::time::Duration::from_secs(30),
            allow_runtime_switch: false,
            switch_cooldown: std::time::Duration::from_secs(5),
            models: HashMap::new(),
            keep_alive: KeepAlive::default(),
            process: aegis_config::ProcessConfig::default(),
            reasoning_model: None,
            reasoning_enabled: false,
        };
        config.models.insert(
            SlotName::Fast,
            ModelSlotConfig {
                name: "llama3".to_string(),
                max_tokens: 512,
                temperature: 0.7,
                context_window: 4096,
            },
        );
        config
    }

    #[tokio::test]
    async fn router_shares_client_index_with_fast() {
        let config = config_with_fast_only();
        let registry = ModelRegistry::initialize(&config).await.unwrap();

        let fast_index = registry.index_for(SlotName::Fast).unwrap();
        let router_index = registry.index_for(SlotName::Router).unwrap();
        assert_eq!(fast_index, router_index);
    }

    #[tokio::test]
    async fn missing_fast_slot_leaves_router_unavailable() {
        let mut config = config_with_fast_only();
        config.models.remove(&SlotName::Fast);
        let registry = ModelRegistry::initialize(&config).await.unwrap();

        assert!(registry.index_for(SlotName::Router).is_err());
    }

    #[tokio::test]
    async fn record_usage_accumulates_under_shared_index() {
        let config = config_with_fast_only();
        let registry = ModelRegistry::initialize(&config).await.unwrap();

        registry.record_usage(SlotName::Fast, 10, 100);
        registry.record_usage(SlotName::Router, 20, 200);

        let stats = registry.stats();
        let fast_stats = &stats.models[&SlotName::Fast];
        let router_stats = &stats.models[&SlotName::Router];
        assert_eq!(fast_stats.use_count, 2);
        assert_eq!(router_stats.use_count, 2);
        assert_eq!(fast_stats.total_tokens, 30);
    }
}
