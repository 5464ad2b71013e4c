//! Live throughput sampling shared by the download and upload probes

use crate::models::metrics::{ProbeSample, RateObservation};
use std::time::Duration;

/// Convert bytes moved over a duration into megabits per second
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 * 8.0 / secs / 1_000_000.0
}

/// Turns a growing byte counter into periodic rate observations.
///
/// At most one observation is emitted per interval and never over a zero
/// length interval.
#[derive(Debug, Clone)]
pub struct RateSampler {
    interval: Duration,
    total_bytes: u64,
    last_emit_bytes: u64,
    last_emit_elapsed: Duration,
}

impl Default for RateSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RateSampler {
    /// Sampler emitting about once per second
    pub fn new() -> Self {
        Self::with_interval(crate::defaults::RATE_EMIT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            total_bytes: 0,
            last_emit_bytes: 0,
            last_emit_elapsed: Duration::ZERO,
        }
    }

    /// Total bytes seen so far
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Feed the cumulative byte counter.
    ///
    /// A counter that goes backwards is ignored.
    pub fn record(&mut self, sample: ProbeSample) -> Option<RateObservation> {
        self.total_bytes = self.total_bytes.max(sample.bytes_transferred);

        let dt = sample.elapsed.saturating_sub(self.last_emit_elapsed);
        if dt.is_zero() || dt < self.interval {
            return None;
        }

        let observation = RateObservation {
            instantaneous_mbps: mbps(self.total_bytes - self.last_emit_bytes, dt),
            average_mbps: mbps(self.total_bytes, sample.elapsed),
            elapsed: sample.elapsed,
        };

        self.last_emit_bytes = self.total_bytes;
        self.last_emit_elapsed = sample.elapsed;
        Some(observation)
    }

    /// Feed a byte delta instead of the cumulative counter
    pub fn add_bytes(&mut self, delta: u64, elapsed: Duration) -> Option<RateObservation> {
        let total = self.total_bytes.saturating_add(delta);
        self.record(ProbeSample::new(total, elapsed))
    }

    /// Authoritative rate of the probe, 0 if nothing was transferred
    pub fn finalize(&self, elapsed: Duration) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            mbps(self.total_bytes, elapsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_mbps_formula() {
        assert_eq!(mbps(1_250_000, Duration::from_secs(1)), 10.0);
        assert_eq!(mbps(1_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_no_emission_before_interval() {
        let mut sampler = RateSampler::new();
        assert!(sampler.add_bytes(100_000, ms(200)).is_none());
        assert!(sampler.add_bytes(100_000, ms(999)).is_none());
        let obs = sampler.add_bytes(100_000, ms(1000)).unwrap();
        assert!((obs.average_mbps - mbps(300_000, ms(1000))).abs() < 1e-9);
        assert_eq!(obs.elapsed, ms(1000));
    }

    #[test]
    fn test_instantaneous_rate_uses_interval_delta() {
        let mut sampler = RateSampler::new();
        sampler.record(ProbeSample::new(1_250_000, ms(1000))).unwrap();
        let obs = sampler.record(ProbeSample::new(5_000_000, ms(2000))).unwrap();
        assert!((obs.instantaneous_mbps - 30.0).abs() < 1e-9);
        assert!((obs.average_mbps - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_never_emits_twice_for_same_instant() {
        let mut sampler = RateSampler::new();
        assert!(sampler.record(ProbeSample::new(10, ms(1500))).is_some());
        assert!(sampler.record(ProbeSample::new(20, ms(1500))).is_none());
    }

    #[test]
    fn test_finalize_without_bytes_is_zero() {
        let sampler = RateSampler::new();
        assert_eq!(sampler.finalize(Duration::from_secs(10)), 0.0);
    }

    #[test]
    fn test_counter_going_backwards_is_ignored() {
        let mut sampler = RateSampler::new();
        sampler.record(ProbeSample::new(1_000, ms(100)));
        sampler.record(ProbeSample::new(500, ms(200)));
        assert_eq!(sampler.total_bytes(), 1_000);
    }

    #[test]
    fn test_deterministic_replay() {
        let steps: Vec<(u64, Duration)> = (1..=25).map(|i| (i * 37_000, ms(i * 250))).collect();
        let replay = || {
            let mut sampler = RateSampler::new();
            steps
                .iter()
                .filter_map(|(bytes, elapsed)| sampler.record(ProbeSample::new(*bytes, *elapsed)))
                .collect::<Vec<_>>()
        };
        let first = replay();
        assert_eq!(first.len(), 6);
        assert_eq!(first, replay());
    }

    proptest! {
        #[test]
        fn prop_final_average_matches_formula(bytes in 1u64..10_000_000_000, millis in 1u64..600_000) {
            let elapsed = ms(millis);
            let mut sampler = RateSampler::new();
            sampler.record(ProbeSample::new(bytes, elapsed));
            let expected = bytes as f64 * 8.0 / elapsed.as_secs_f64() / 1e6;
            let actual = sampler.finalize(elapsed);
            prop_assert!((actual - expected).abs() <= expected.abs() * 1e-12 + 1e-12);
        }

        #[test]
        fn prop_emissions_at_least_one_interval_apart(deltas in prop::collection::vec((0u64..1_000_000, 1u64..700), 1..60)) {
            let mut sampler = RateSampler::new();
            let mut elapsed = Duration::ZERO;
            let mut last: Option<Duration> = None;
            for (bytes, step) in deltas {
                elapsed += ms(step);
                if let Some(obs) = sampler.add_bytes(bytes, elapsed) {
                    if let Some(prev) = last {
                        prop_assert!(obs.elapsed - prev >= Duration::from_secs(1));
                    }
                    prop_assert!(obs.instantaneous_mbps >= 0.0);
                    last = Some(obs.elapsed);
                }
            }
        }
    }
}
