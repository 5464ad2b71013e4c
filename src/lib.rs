//! Internet Speed Tester
//!
//! Measures download throughput, upload throughput and round-trip latency
//! over plain HTTP against a configurable catalog of public endpoints,
//! without depending on any dedicated speed-test protocol or server.

pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use catalog::{Endpoint, EndpointCatalog};
pub use error::{AppError, Result};
pub use executor::{EngineEvent, RunHandle, SpeedTestEngine};
pub use models::{Config, LatencyAggregate, LatencyResult, ProbeResult, RateObservation, RunStatistics, TestRun};
pub use output::{ColoredFormatter, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use types::{Direction, PayloadSource, RunState, TestMode};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_MODE: &str = "both";
    pub const DEFAULT_PROBE_DURATION: Duration = Duration::from_secs(10);
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_LATENCY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_RETAIN_PAYLOAD: bool = true;
    pub const DEFAULT_MAX_RETAINED_MB: u64 = 256;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Some mirrors refuse clients that do not look like a browser
    pub const DEFAULT_USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Live rate observations are emitted at most this often
    pub const RATE_EMIT_INTERVAL: Duration = Duration::from_secs(1);
    /// Largest slice of a download body counted in one step
    pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;
    /// Size of each upload body chunk
    pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;
    /// How long an upload waits for the sink's response once the body is closed
    pub const UPLOAD_RESPONSE_GRACE: Duration = Duration::from_secs(2);
}
