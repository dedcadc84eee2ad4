//! Bounded in-memory history of recent pipelines (spec.md §3 "Pipeline":
//! "the orchestrator retains the most recent pipelines for inspection, not
//! the full history").

use aegis_types::Pipeline;
use parking_lot::Mutex;
use std::collections::VecDeque;

const MAX_RETAINED: usize = 50;

/// Ring buffer of the most recently completed (or failed) pipelines, newest
/// last. A single `parking_lot::Mutex` is fine here -- every critical
/// section is a handful of `VecDeque` operations, never held across an
/// `.await` (spec.md §5 "Locking discipline").
#[derive(Default)]
pub struct PipelineStore {
    recent: Mutex<VecDeque<Pipeline>>,
}

impl PipelineStore {
    #[must_use]
    pub fn new() -> Self {
        Self { recent: Mutex::new(VecDeque::with_capacity(MAX_RETAINED)) }
    }

    pub fn record(&self, pipeline: Pipeline) {
        let mut recent = self.recent.lock();
        recent.push_back(pipeline);
        while recent.len() > MAX_RETAINED {
            recent.pop_front();
        }
    }

    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<Pipeline> {
        self.recent.lock().iter().find(|p| p.request_id == request_id).cloned()
    }

    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Pipeline> {
        let recent = self.recent.lock();
        recent.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_caps_at_fifty() {
        let store = PipelineStore::new();
        for i in 0..60 {
            store.record(Pipeline::new(format!("r{i}")));
        }
        assert_eq!(store.recent(100).len(), MAX_RETAINED);
    }

    #[test]
    fn oldest_evicted_first() {
        let store = PipelineStore::new();
        for i in 0..51 {
            store.record(Pipeline::new(format!("r{i}")));
        }
        assert!(store.get("r0").is_none());
        assert!(store.get("r50").is_some());
    }

    #[test]
    fn recent_returns_newest_first() {
        let store = PipelineStore::new();
        store.record(Pipeline::new("r0"));
        store.record(Pipeline::new("r1"));
        let recent = store.recent(10);
        assert_eq!(recent[0].request_id, "r1");
    }
}
