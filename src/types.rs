//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Test modes supported by the measurement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Download throughput only
    Download,
    /// Upload throughput only
    Upload,
    /// Download, then upload reusing the downloaded bytes
    Both,
    /// Round-trip latency against the probe hosts
    Latency,
}

impl TestMode {
    /// Lowercase name as used on the command line and in JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Download => "download",
            TestMode::Upload => "upload",
            TestMode::Both => "both",
            TestMode::Latency => "latency",
        }
    }

    /// Whether this mode runs a download phase
    pub fn includes_download(&self) -> bool {
        matches!(self, TestMode::Download | TestMode::Both)
    }

    /// Whether this mode runs an upload phase
    pub fn includes_upload(&self) -> bool {
        matches!(self, TestMode::Upload | TestMode::Both)
    }

    /// Whether this mode runs the latency phase
    pub fn includes_latency(&self) -> bool {
        matches!(self, TestMode::Latency)
    }

    /// Downloaded bytes are only worth keeping when an upload follows
    pub fn wants_retained_payload(&self) -> bool {
        matches!(self, TestMode::Both)
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "download" | "down" => Ok(TestMode::Download),
            "upload" | "up" => Ok(TestMode::Upload),
            "both" | "all" => Ok(TestMode::Both),
            "latency" | "ping" => Ok(TestMode::Latency),
            other => Err(AppError::parse(format!(
                "test mode '{}', expected one of: download, upload, both, latency",
                other
            ))),
        }
    }
}

/// Orchestrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Preparing,
    Downloading,
    Uploading,
    ProbingLatency,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Cancelled)
    }

    /// Progress message announced when the state is entered
    pub fn progress_message(&self) -> Option<&'static str> {
        match self {
            RunState::Preparing => Some("Preparing..."),
            RunState::Downloading => Some("Downloading..."),
            RunState::Uploading => Some("Uploading..."),
            RunState::ProbingLatency => Some("Probing latency..."),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Preparing => "preparing",
            RunState::Downloading => "downloading",
            RunState::Uploading => "uploading",
            RunState::ProbingLatency => "probing latency",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Direction of a throughput probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the upload body bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    /// Bytes captured by the preceding download probe
    RetainedDownload,
    /// Generated filler
    Synthetic,
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSource::RetainedDownload => f.write_str("retained download"),
            PayloadSource::Synthetic => f.write_str("synthetic"),
        }
    }
}
