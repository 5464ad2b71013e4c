//! Data models and structures for the speed tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{
    LatencyAggregate, LatencyResult, ProbeResult, ProbeSample, RateObservation, RunStatistics,
    TestRun, ThroughputReport,
};
