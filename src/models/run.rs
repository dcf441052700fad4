//! Aggregate results of a load run

use crate::models::duration_ms;
use crate::types::LatencyClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated outcome counts and timings for one load run.
///
/// Built by the load driver's accumulator once every worker has finished and
/// handed to the caller; it is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRunResult {
    pub total_requests: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Failed requests whose deadline elapsed
    pub timed_out: u64,
    /// Failed requests that hit a socket or resolution error
    pub transport_errors: u64,
    /// Successful requests whose reply carried no backend tag
    pub unattributed: u64,
    /// Wall-clock span from the first dispatch to the last completion
    #[serde(rename = "total_duration_ms", with = "duration_ms")]
    pub total_duration: Duration,
    pub per_backend_counts: BTreeMap<String, u64>,
    pub latency: LatencySummary,
}

impl LoadRunResult {
    /// Success rate as a percentage (0.0-100.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Completed requests per second over the wall-clock span
    pub fn throughput(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.total_requests as f64 / secs
        }
    }

    /// Wall-clock time divided by request count, in milliseconds
    pub fn avg_time_per_request_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_duration.as_secs_f64() * 1000.0 / self.total_requests as f64
        }
    }

    /// Number of requests attributed to some backend
    pub fn attributed(&self) -> u64 {
        self.per_backend_counts.values().sum()
    }

    /// Check the counting invariants every finished run must satisfy
    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed == self.total_requests
            && self.timed_out + self.transport_errors == self.failed
            && self.attributed() + self.unattributed == self.succeeded
            && self.attributed() <= self.succeeded
    }
}

/// Latency distribution over the successful round-trips of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub sample_count: usize,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencySummary {
    /// Calculate a summary from successful round-trip latencies
    pub fn from_latencies(latencies: &[Duration]) -> Self {
        if latencies.is_empty() {
            return Self::empty();
        }

        let mut samples: Vec<f64> = latencies
            .iter()
            .map(|latency| latency.as_secs_f64() * 1000.0)
            .collect();
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = if count > 1 {
            samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count as f64
        } else {
            0.0
        };

        Self {
            sample_count: count,
            min_ms: samples[0],
            mean_ms: mean,
            max_ms: samples[count - 1],
            std_dev_ms: variance.sqrt(),
            p50_ms: percentile(&samples, 50.0),
            p95_ms: percentile(&samples, 95.0),
            p99_ms: percentile(&samples, 99.0),
        }
    }

    /// Create an empty summary
    pub fn empty() -> Self {
        Self {
            sample_count: 0,
            min_ms: 0.0,
            mean_ms: 0.0,
            max_ms: 0.0,
            std_dev_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
        }
    }

    pub fn latency_class(&self) -> Option<LatencyClass> {
        if self.sample_count == 0 {
            None
        } else {
            Some(LatencyClass::from_duration(Duration::from_secs_f64(self.mean_ms / 1000.0)))
        }
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> LoadRunResult {
        let mut per_backend_counts = BTreeMap::new();
        per_backend_counts.insert("game-server-1".to_string(), 40);
        per_backend_counts.insert("game-server-2".to_string(), 50);

        LoadRunResult {
            total_requests: 100,
            succeeded: 95,
            failed: 5,
            timed_out: 4,
            transport_errors: 1,
            unattributed: 5,
            total_duration: Duration::from_secs(2),
            per_backend_counts,
            latency: LatencySummary::empty(),
        }
    }

    #[test]
    fn test_derived_rates() {
        let result = sample_result();
        assert!((result.success_rate() - 95.0).abs() < f64::EPSILON);
        assert!((result.throughput() - 50.0).abs() < 1e-9);
        assert!((result.avg_time_per_request_ms() - 20.0).abs() < 1e-9);
        assert_eq!(result.attributed(), 90);
        assert!(result.is_consistent());
    }

    #[test]
    fn test_inconsistent_counts_detected() {
        let mut result = sample_result();
        result.failed = 6;
        assert!(!result.is_consistent());
    }

    #[test]
    fn test_latency_summary() {
        let latencies: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        let summary = LatencySummary::from_latencies(&latencies);

        assert_eq!(summary.sample_count, 100);
        assert!((summary.min_ms - 1.0).abs() < 1e-9);
        assert!((summary.max_ms - 100.0).abs() < 1e-9);
        assert!((summary.mean_ms - 50.5).abs() < 1e-9);
        assert!((summary.p50_ms - 50.0).abs() < 1e-9);
        assert!((summary.p95_ms - 95.0).abs() < 1e-9);
        assert!((summary.p99_ms - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_latency_summary() {
        let summary = LatencySummary::from_latencies(&[]);
        assert_eq!(summary, LatencySummary::empty());
        assert!(summary.latency_class().is_none());
    }

    #[test]
    fn test_single_sample_has_zero_deviation() {
        let summary = LatencySummary::from_latencies(&[Duration::from_millis(7)]);
        assert_eq!(summary.std_dev_ms, 0.0);
        assert!((summary.p99_ms - 7.0).abs() < 1e-9);
    }
}
