//! Statistical reduction of probe samples

use crate::models::metrics::{LatencyAggregate, LatencyResult, ProbeResult, RunStatistics};
use serde::{Deserialize, Serialize};

/// Basic reduction of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

/// Reduce samples to {min, max, avg}; `None` for an empty set.
///
/// Non-finite samples are ignored.
pub fn summarize(samples: &[f64]) -> Option<Summary> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = finite.iter().sum::<f64>() / finite.len() as f64;

    Some(Summary {
        min,
        max,
        avg,
        count: finite.len(),
    })
}

/// Statistics over the successful attempts of a throughput phase
pub fn run_statistics(attempts: &[ProbeResult]) -> Option<RunStatistics> {
    let samples: Vec<f64> = attempts.iter().filter_map(|a| a.rate_mbps).collect();
    RunStatistics::from_samples(samples)
}

/// Aggregate latency results, keeping failures but only measuring successes
pub fn latency_aggregate(results: Vec<LatencyResult>) -> LatencyAggregate {
    let samples: Vec<f64> = results.iter().filter_map(|r| r.round_trip_ms).collect();
    let summary = summarize(&samples);

    LatencyAggregate {
        average: summary.map(|s| s.avg),
        min: summary.map(|s| s.min),
        max: summary.map(|s| s.max),
        success_count: samples.len(),
        total_count: results.len(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
        assert!(summarize(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_summarize_basic() {
        let summary = summarize(&[10.0, 30.0, 20.0]).unwrap();
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 30.0);
        assert_eq!(summary.avg, 20.0);
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn test_single_success_among_failures_is_exact() {
        let attempts = vec![
            ProbeResult::failed("a", "http://a", "unreachable"),
            ProbeResult::measured("b", "http://b", 6_250_000, Duration::from_secs(1)),
            ProbeResult::failed("c", "http://c", "HTTP 500"),
        ];
        let stats = run_statistics(&attempts).unwrap();
        assert_eq!(stats.avg, 50.0);
        assert_eq!(stats.samples.len(), 1);
    }

    #[test]
    fn test_all_failed_attempts_have_no_statistics() {
        let attempts = vec![
            ProbeResult::failed("a", "http://a", "unreachable"),
            ProbeResult::failed("b", "http://b", "unreachable"),
        ];
        assert!(run_statistics(&attempts).is_none());
    }

    #[test]
    fn test_latency_aggregate_counts_only_successes() {
        let results = vec![
            LatencyResult::success("a", "http://a", 10.0, 200),
            LatencyResult::no_response("b", "http://b", "timeout"),
            LatencyResult::success("c", "http://c", 20.0, 301),
            LatencyResult::no_response("d", "http://d", "HTTP 503"),
            LatencyResult::success("e", "http://e", 30.0, 404),
        ];
        let aggregate = latency_aggregate(results);
        assert_eq!(aggregate.success_count, 3);
        assert_eq!(aggregate.total_count, 5);
        assert_eq!(aggregate.average, Some(20.0));
        assert_eq!(aggregate.min, Some(10.0));
        assert_eq!(aggregate.max, Some(30.0));
        assert_eq!(aggregate.results.len(), 5);
    }

    #[test]
    fn test_latency_aggregate_all_failed() {
        let aggregate = latency_aggregate(vec![LatencyResult::no_response("a", "http://a", "timeout")]);
        assert_eq!(aggregate.success_count, 0);
        assert_eq!(aggregate.total_count, 1);
        assert!(aggregate.average.is_none());
    }

    proptest! {
        #[test]
        fn prop_summary_bounds_hold(samples in prop::collection::vec(0.0f64..10_000.0, 1..50)) {
            let summary = summarize(&samples).unwrap();
            prop_assert!(summary.min <= summary.avg + 1e-9);
            prop_assert!(summary.avg <= summary.max + 1e-9);
            prop_assert_eq!(summary.count, samples.len());
        }
    }
}
