//! Telemetry data model (spec.md §3 "TelemetryMetric").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a metric's value is aggregated (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// One buffered metric observation, pending its next bulk flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMetric {
    pub name: String,
    pub value: f64,
    pub kind: MetricKind,
    pub tags: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Percentile summary of a histogram's retained samples (spec.md §4.11).
/// p95/p99 degrade to `max` below 100/20 samples respectively, since a true
/// percentile isn't meaningful over a handful of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Compute percentile stats over `samples`, sorting a copy in place.
/// `samples` need not be pre-sorted and may be empty (returns all-zero stats).
#[must_use]
pub fn compute_stats(samples: &[f64]) -> HistogramStats {
    if samples.is_empty() {
        return HistogramStats { count: 0, min: 0.0, max: 0.0, mean: 0.0, p50: 0.0, p95: 0.0, p99: 0.0 };
    }

    let mut sorted: Vec<f64> = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let min = sorted[0];
    let max = sorted[count - 1];
    let mean = sorted.iter().sum::<f64>() / count as f64;

    let percentile = |p: f64| -> f64 {
        let idx = ((p * count as f64).ceil() as usize).saturating_sub(1).min(count - 1);
        sorted[idx]
    };

    let p50 = percentile(0.50);
    let p95 = if count < 20 { max } else { percentile(0.95) };
    let p99 = if count < 100 { max } else { percentile(0.99) };

    HistogramStats { count, min, max, mean, p50, p95, p99 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_yield_zeroed_stats() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn p95_degrades_to_max_below_twenty_samples() {
        let samples: Vec<f64> = (1..=10).map(f64::from).collect();
        let stats = compute_stats(&samples);
        assert_eq!(stats.p95, stats.max);
        assert_eq!(stats.p99, stats.max);
    }

    #[test]
    fn p99_degrades_to_max_below_hundred_samples_but_p95_does_not() {
        let samples: Vec<f64> = (1..=50).map(f64::from).collect();
        let stats = compute_stats(&samples);
        assert_eq!(stats.p99, stats.max);
        assert!(stats.p95 < stats.max);
    }

    #[test]
    fn mean_and_min_max_over_known_set() {
        let stats = compute_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.mean, 3.0);
    }
}
