//! `TelemetryCollector`: in-memory hot path plus a background batched flush
//! (spec.md §4.11).

use crate::error::Result;
use crate::types::{compute_stats, HistogramStats, MetricKind, TelemetryMetric};
use aegis_config::TelemetryConfig;
use aegis_storage::Storage;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const HISTOGRAM_CAP: usize = 1_000;

#[derive(Default)]
struct Aggregates {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, VecDeque<f64>>,
}

/// Buffered metric recording with one lock guarding the unflushed buffer
/// (spec.md §5 "Locking discipline").
pub struct TelemetryCollector {
    storage: Arc<Storage>,
    config: TelemetryConfig,
    buffer: Mutex<Vec<TelemetryMetric>>,
    aggregates: Mutex<Aggregates>,
    cancel: CancellationToken,
}

impl TelemetryCollector {
    #[must_use]
    pub fn new(storage: Arc<Storage>, config: TelemetryConfig) -> Self {
        Self {
            storage,
            config,
            buffer: Mutex::new(Vec::new()),
            aggregates: Mutex::new(Aggregates::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Append to the buffer and update the relevant in-memory aggregate
    /// (spec.md §4.11). A no-op when telemetry is disabled.
    pub fn record_metric(&self, name: &str, value: f64, tags: HashMap<String, String>, kind: MetricKind) {
        if !self.config.enabled {
            return;
        }

        {
            let mut aggregates = self.aggregates.lock();
            match kind {
                MetricKind::Counter => *aggregates.counters.entry(name.to_string()).or_insert(0.0) += value,
                MetricKind::Gauge => {
                    aggregates.gauges.insert(name.to_string(), value);
                }
                MetricKind::Histogram => {
                    let samples = aggregates.histograms.entry(name.to_string()).or_default();
                    samples.push_back(value);
                    if samples.len() > HISTOGRAM_CAP {
                        samples.pop_front();
                    }
                }
            }
        }

        self.buffer.lock().push(TelemetryMetric {
            name: name.to_string(),
            value,
            kind,
            tags,
            created_at: Utc::now(),
        });
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> f64 {
        self.aggregates.lock().counters.get(name).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.aggregates.lock().gauges.get(name).copied()
    }

    #[must_use]
    pub fn histogram_stats(&self, name: &str) -> HistogramStats {
        let aggregates = self.aggregates.lock();
        match aggregates.histograms.get(name) {
            Some(samples) => {
                let contiguous: Vec<f64> = samples.iter().copied().collect();
                compute_stats(&contiguous)
            }
            None => compute_stats(&[]),
        }
    }

    /// Swap the buffer with an empty one and bulk-insert everything it held
    /// in a single transaction (spec.md §4.11). Best-effort: failures are
    /// logged, never propagated to the caller.
    async fn flush(&self) {
        let drained = std::mem::take(&mut *self.buffer.lock());
        if drained.is_empty() {
            return;
        }

        if let Err(e) = self.bulk_insert(&drained).await {
            tracing::warn!(error = %e, dropped = drained.len(), "telemetry flush failed");
        }
    }

    async fn bulk_insert(&self, metrics: &[TelemetryMetric]) -> Result<()> {
        let rows: Vec<Vec<Value>> = metrics
            .iter()
            .map(|m| {
                vec![
                    Value::Text(m.name.clone()),
                    Value::Real(m.value),
                    Value::Text(m.kind.as_str().to_string()),
                    Value::Text(serde_json::to_string(&m.tags).unwrap_or_default()),
                    Value::Text(m.created_at.to_rfc3339()),
                ]
            })
            .collect();

        self.storage
            .execute_many(
                "INSERT INTO telemetry_metrics (metric_name, value, kind, tags, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rows,
            )
            .await?;
        Ok(())
    }

    /// Spawn the periodic background flush task (spec.md §4.11). Runs until
    /// `shutdown` cancels it, at which point it performs one final flush
    /// before returning.
    pub fn spawn_flush_task(self: &Arc<Self>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        let interval = std::time::Duration::from_secs(self.config.collect_interval_secs.max(1));
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        collector.flush().await;
                    }
                }
            }
            collector.flush().await;
        })
    }

    /// Cancel the background task and perform a final flush (spec.md §4.11
    /// "Shutdown"). Callers must have already awaited the `JoinHandle`
    /// returned by `spawn_flush_task`, or call this before dropping it.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn collector() -> (Arc<TelemetryCollector>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("test.db"), 2).await.unwrap());
        let config = TelemetryConfig { enabled: true, collect_interval_secs: 3600, retention_days: 30 };
        (Arc::new(TelemetryCollector::new(storage, config)), dir)
    }

    #[tokio::test]
    async fn counters_aggregate_by_addition() {
        let (c, _dir) = collector().await;
        for _ in 0..500 {
            c.record_metric("x", 1.0, HashMap::new(), MetricKind::Counter);
        }
        assert_eq!(c.counter("x"), 500.0);
    }

    #[tokio::test]
    async fn gauges_are_last_write_wins() {
        let (c, _dir) = collector().await;
        c.record_metric("g", 1.0, HashMap::new(), MetricKind::Gauge);
        c.record_metric("g", 2.0, HashMap::new(), MetricKind::Gauge);
        assert_eq!(c.gauge("g"), Some(2.0));
    }

    #[tokio::test]
    async fn histogram_caps_at_one_thousand_samples() {
        let (c, _dir) = collector().await;
        for i in 0..1_500 {
            c.record_metric("h", f64::from(i), HashMap::new(), MetricKind::Histogram);
        }
        let stats = c.histogram_stats("h");
        assert_eq!(stats.count, HISTOGRAM_CAP);
        assert_eq!(stats.max, 1_499.0);
    }

    #[tokio::test]
    async fn flush_bulk_inserts_and_empties_buffer() {
        let (c, _dir) = collector().await;
        for _ in 0..500 {
            c.record_metric("x", 1.0, HashMap::new(), MetricKind::Counter);
        }
        c.flush().await;
        assert!(c.buffer.lock().is_empty());

        let rows: Vec<i64> = c
            .storage
            .fetch_all(
                "SELECT COUNT(*) FROM telemetry_metrics WHERE metric_name = 'x'",
                vec![],
                |row| row.get(0),
            )
            .await
            .unwrap();
        assert_eq!(rows[0], 500);
    }

    #[tokio::test]
    async fn disabled_collector_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("test.db"), 2).await.unwrap());
        let config = TelemetryConfig { enabled: false, collect_interval_secs: 3600, retention_days: 30 };
        let c = TelemetryCollector::new(storage, config);
        c.record_metric("x", 1.0, HashMap::new(), MetricKind::Counter);
        assert_eq!(c.counter("x"), 0.0);
        assert!(c.buffer.lock().is_empty());
    }
}
