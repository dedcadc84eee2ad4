//! Buffered metrics: in-memory counters/gauges/histograms, periodically
//! flushed to storage in one bulk write (spec.md §4.11).

mod collector;
mod error;
mod types;

pub use collector::TelemetryCollector;
pub use error::{Result, TelemetryError};
pub use types::{compute_stats, HistogramStats, MetricKind, TelemetryMetric};
