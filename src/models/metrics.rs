//! Probe, rate and run result data models

use crate::types::{PayloadSource, TestMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Cumulative progress of one probe at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    /// Total bytes moved since the probe started
    pub bytes_transferred: u64,
    /// Time since the probe started
    pub elapsed: Duration,
}

impl ProbeSample {
    pub fn new(bytes_transferred: u64, elapsed: Duration) -> Self {
        Self { bytes_transferred, elapsed }
    }
}

/// Point-in-time throughput observation emitted while a probe is running
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    /// Rate over the interval since the previous observation (Mbps)
    pub instantaneous_mbps: f64,
    /// Rate since the probe started (Mbps)
    pub average_mbps: f64,
    /// Time since the probe started
    pub elapsed: Duration,
}

/// Outcome of a single endpoint attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Label of the endpoint that was probed
    pub endpoint_label: String,

    /// URL of the endpoint that was probed
    pub endpoint_url: String,

    /// Measured rate, absent when the attempt failed
    pub rate_mbps: Option<f64>,

    /// Bytes moved during the attempt
    pub bytes_transferred: u64,

    /// Duration of the attempt
    pub elapsed: Duration,

    /// Error message if the attempt failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Build a result from what a probe actually moved.
    ///
    /// A rate is only present when both bytes and elapsed time are positive;
    /// anything else is recorded as a failed attempt.
    pub fn measured(
        endpoint_label: impl Into<String>,
        endpoint_url: impl Into<String>,
        bytes_transferred: u64,
        elapsed: Duration,
    ) -> Self {
        let rate_mbps = if bytes_transferred > 0 && !elapsed.is_zero() {
            Some(crate::probe::rate::mbps(bytes_transferred, elapsed))
        } else {
            None
        };
        let error_message = rate_mbps
            .is_none()
            .then(|| "No data transferred".to_string());

        Self {
            endpoint_label: endpoint_label.into(),
            endpoint_url: endpoint_url.into(),
            rate_mbps,
            bytes_transferred,
            elapsed,
            error_message,
            timestamp: Utc::now(),
        }
    }

    /// Build a failed result
    pub fn failed(
        endpoint_label: impl Into<String>,
        endpoint_url: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_label: endpoint_label.into(),
            endpoint_url: endpoint_url.into(),
            rate_mbps: None,
            bytes_transferred: 0,
            elapsed: Duration::ZERO,
            error_message: Some(error_message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Check if this attempt produced a usable rate
    pub fn is_successful(&self) -> bool {
        self.rate_mbps.is_some()
    }
}

/// Summary of the successful samples of one throughput phase.
///
/// Never built from an empty sample set: a phase without successes has no
/// statistics at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub samples: Vec<f64>,
}

impl RunStatistics {
    /// Build statistics from successful samples, `None` if there are none
    pub fn from_samples(samples: Vec<f64>) -> Option<Self> {
        let summary = crate::stats::summarize(&samples)?;
        Some(Self {
            max: summary.max,
            min: summary.min,
            avg: summary.avg,
            samples,
        })
    }

    /// Headline rate in megabytes per second
    pub fn avg_megabytes_per_sec(&self) -> f64 {
        mbps_to_megabytes_per_sec(self.avg)
    }

    /// Format the headline rate for display
    pub fn format_avg(&self) -> String {
        format!("{:.2} Mbps ({:.2} MB/s)", self.avg, self.avg_megabytes_per_sec())
    }
}

/// Convert megabits per second into megabytes per second
pub fn mbps_to_megabytes_per_sec(mbps: f64) -> f64 {
    mbps / 8.0
}

/// Result of one throughput phase (download or upload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputReport {
    /// Statistics over the successful attempts
    pub statistics: RunStatistics,

    /// Endpoint whose attempt produced the headline rate
    pub endpoint_label: String,

    /// Bytes moved by the winning attempt
    pub bytes_transferred: u64,

    /// Where the upload body came from (upload phase only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_source: Option<PayloadSource>,

    /// Every attempt of the phase in the order they were made
    pub attempts: Vec<ProbeResult>,
}

impl ThroughputReport {
    /// Build the report for a phase, `None` when no attempt succeeded
    pub fn from_attempts(attempts: Vec<ProbeResult>, payload_source: Option<PayloadSource>) -> Option<Self> {
        let statistics = crate::stats::run_statistics(&attempts)?;
        let winner = attempts.iter().rev().find(|a| a.is_successful())?;
        Some(Self {
            statistics,
            endpoint_label: winner.endpoint_label.clone(),
            bytes_transferred: winner.bytes_transferred,
            payload_source,
            attempts,
        })
    }

    /// Number of attempts that failed before the phase settled
    pub fn failed_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| !a.is_successful()).count()
    }
}

/// Round-trip measurement against one latency host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyResult {
    /// Human-readable host label
    pub host_label: String,

    /// URL that was probed
    pub url: String,

    /// Round-trip time, absent when the host did not answer in time
    pub round_trip_ms: Option<f64>,

    /// HTTP status received, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// Why the probe produced no measurement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LatencyResult {
    pub fn success(host_label: impl Into<String>, url: impl Into<String>, round_trip_ms: f64, http_status: u16) -> Self {
        Self {
            host_label: host_label.into(),
            url: url.into(),
            round_trip_ms: Some(round_trip_ms),
            http_status: Some(http_status),
            error_message: None,
        }
    }

    pub fn no_response(host_label: impl Into<String>, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            host_label: host_label.into(),
            url: url.into(),
            round_trip_ms: None,
            http_status: None,
            error_message: Some(reason.into()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.round_trip_ms.is_some()
    }

    /// Format the outcome for display
    pub fn format_round_trip(&self) -> String {
        match self.round_trip_ms {
            Some(ms) => format!("{:.1}ms", ms),
            None => "timed out".to_string(),
        }
    }
}

/// All latency results plus aggregate numbers over the successful ones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyAggregate {
    pub results: Vec<LatencyResult>,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub success_count: usize,
    pub total_count: usize,
}

impl LatencyAggregate {
    /// Aggregate over all results; statistics only use successful entries
    pub fn from_results(results: Vec<LatencyResult>) -> Self {
        crate::stats::latency_aggregate(results)
    }

    /// Results keyed by host label
    pub fn by_host(&self) -> BTreeMap<&str, &LatencyResult> {
        self.results
            .iter()
            .map(|r| (r.host_label.as_str(), r))
            .collect()
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            (self.success_count as f64 / self.total_count as f64) * 100.0
        }
    }
}

/// Immutable snapshot of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Identifier shared with the run's log entries
    pub run_id: Uuid,

    /// Mode the run was started with
    pub mode: TestMode,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<ThroughputReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<ThroughputReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyAggregate>,
}

impl TestRun {
    /// Start a new, empty run
    pub fn new(run_id: Uuid, mode: TestMode) -> Self {
        Self {
            run_id,
            mode,
            started_at: Utc::now(),
            completed_at: None,
            download: None,
            upload: None,
            latency: None,
        }
    }

    /// Mark the run complete, producing the published snapshot
    pub fn complete(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    /// Wall-clock duration of the run, if completed
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
