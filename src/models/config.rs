//! Configuration data model and validation

use crate::catalog::EndpointCatalog;
use crate::types::{AppError, Result, TestMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Which phases a run measures
    #[serde(default = "default_mode")]
    pub mode: TestMode,

    /// Time budget for one download or upload probe
    #[serde(default = "default_probe_duration_secs")]
    pub probe_duration_secs: u64,

    /// Hard ceiling on a single stalled read or response
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Per-host wait in the latency phase
    #[serde(default = "default_latency_timeout_secs")]
    pub latency_timeout_secs: u64,

    /// Reuse downloaded bytes as the upload payload in `both` mode
    #[serde(default = "default_retain_payload")]
    pub retain_payload: bool,

    #[serde(default = "default_max_retained_mb")]
    pub max_retained_mb: u64,

    /// JSON endpoint catalog replacing the built-in one
    #[serde(default)]
    pub catalog_path: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Print the finished run as JSON
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            probe_duration_secs: default_probe_duration_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            latency_timeout_secs: default_latency_timeout_secs(),
            retain_payload: default_retain_payload(),
            max_retained_mb: default_max_retained_mb(),
            catalog_path: None,
            user_agent: default_user_agent(),
            enable_color: default_enable_color(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe_duration(&self) -> Duration {
        Duration::from_secs(self.probe_duration_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn latency_timeout(&self) -> Duration {
        Duration::from_secs(self.latency_timeout_secs)
    }

    /// Retention cap in bytes
    pub fn max_retained_bytes(&self) -> usize {
        let bytes = self.max_retained_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.probe_duration_secs == 0 {
            return Err(AppError::config("Probe duration must be greater than 0"));
        }
        if self.probe_duration_secs > 120 {
            return Err(AppError::config("Probe duration cannot exceed 120 seconds"));
        }

        if self.io_timeout_secs == 0 {
            return Err(AppError::config("I/O timeout must be greater than 0"));
        }
        if self.io_timeout_secs > 300 {
            return Err(AppError::config("I/O timeout cannot exceed 300 seconds"));
        }
        if self.io_timeout_secs < self.probe_duration_secs {
            return Err(AppError::config(format!(
                "I/O timeout ({}s) must not be shorter than the probe duration ({}s)",
                self.io_timeout_secs, self.probe_duration_secs
            )));
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(AppError::config("Connect timeout must be between 1 and 60 seconds"));
        }

        if self.latency_timeout_secs == 0 || self.latency_timeout_secs > 5 {
            return Err(AppError::config("Latency timeout must be between 1 and 5 seconds"));
        }

        if self.max_retained_mb == 0 || self.max_retained_mb > 2048 {
            return Err(AppError::config("Retained payload cap must be between 1 and 2048 MB"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(AppError::config("User agent cannot be empty"));
        }

        if let Some(path) = &self.catalog_path {
            if path.trim().is_empty() {
                return Err(AppError::config("Endpoint catalog path cannot be empty"));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(mode) = std::env::var("TEST_MODE") {
            self.mode = mode
                .parse()
                .map_err(|e| AppError::config(format!("Invalid TEST_MODE value '{}': {}", mode, e)))?;
        }

        if let Ok(duration) = std::env::var("PROBE_DURATION") {
            self.probe_duration_secs = duration
                .parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_DURATION value '{}': {}", duration, e)))?;
        }

        if let Ok(timeout) = std::env::var("IO_TIMEOUT") {
            self.io_timeout_secs = timeout
                .parse()
                .map_err(|e| AppError::config(format!("Invalid IO_TIMEOUT value '{}': {}", timeout, e)))?;
        }

        if let Ok(timeout) = std::env::var("CONNECT_TIMEOUT") {
            self.connect_timeout_secs = timeout
                .parse()
                .map_err(|e| AppError::config(format!("Invalid CONNECT_TIMEOUT value '{}': {}", timeout, e)))?;
        }

        if let Ok(timeout) = std::env::var("LATENCY_TIMEOUT") {
            self.latency_timeout_secs = timeout
                .parse()
                .map_err(|e| AppError::config(format!("Invalid LATENCY_TIMEOUT value '{}': {}", timeout, e)))?;
        }

        if let Ok(retain) = std::env::var("RETAIN_PAYLOAD") {
            self.retain_payload = retain
                .parse()
                .map_err(|e| AppError::config(format!("Invalid RETAIN_PAYLOAD value '{}': {}", retain, e)))?;
        }

        if let Ok(cap) = std::env::var("MAX_RETAINED_MB") {
            self.max_retained_mb = cap
                .parse()
                .map_err(|e| AppError::config(format!("Invalid MAX_RETAINED_MB value '{}': {}", cap, e)))?;
        }

        if let Ok(path) = std::env::var("ENDPOINT_CATALOG") {
            let path = path.trim();
            self.catalog_path = (!path.is_empty()).then(|| path.to_string());
        }

        if let Ok(user_agent) = std::env::var("USER_AGENT") {
            if !user_agent.trim().is_empty() {
                self.user_agent = user_agent;
            }
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color
                .parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }

    /// Load the endpoint catalog this configuration points at
    pub fn load_catalog(&self) -> Result<EndpointCatalog> {
        EndpointCatalog::load(self.catalog_path.as_deref().map(Path::new))
    }
}

// Default value functions for serde
fn default_mode() -> TestMode {
    crate::defaults::DEFAULT_MODE.parse().unwrap_or(TestMode::Both)
}

fn default_probe_duration_secs() -> u64 {
    crate::defaults::DEFAULT_PROBE_DURATION.as_secs()
}

fn default_io_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_IO_TIMEOUT.as_secs()
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_latency_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_LATENCY_TIMEOUT.as_secs()
}

fn default_retain_payload() -> bool {
    crate::defaults::DEFAULT_RETAIN_PAYLOAD
}

fn default_max_retained_mb() -> u64 {
    crate::defaults::DEFAULT_MAX_RETAINED_MB
}

fn default_user_agent() -> String {
    crate::defaults::DEFAULT_USER_AGENT.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
