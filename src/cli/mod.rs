//! Command-line interface

use crate::types::TestMode;
use clap::Parser;

/// Internet Speed Tester - measures download, upload and latency over plain HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "ist")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Phases to measure: download, upload, both or latency
    #[arg(short, long, value_enum)]
    pub mode: Option<TestMode>,

    /// Time budget per download/upload probe in seconds
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Ceiling on a stalled read or response in seconds
    #[arg(long, value_parser = parse_duration)]
    pub io_timeout: Option<u64>,

    /// Connection establishment timeout in seconds
    #[arg(long, value_parser = parse_duration)]
    pub connect_timeout: Option<u64>,

    /// Per-host latency probe timeout in seconds
    #[arg(long, value_parser = parse_duration)]
    pub latency_timeout: Option<u64>,

    /// Upload synthetic filler instead of the downloaded bytes
    #[arg(long)]
    pub no_retain: bool,

    /// Cap on downloaded bytes kept for the upload phase, in MB
    #[arg(long, value_name = "MB")]
    pub max_retained_mb: Option<u64>,

    /// JSON endpoint catalog replacing the built-in endpoints
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the finished run as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print the effective endpoint catalog as JSON and exit
    #[arg(long)]
    pub print_catalog: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let (Some(duration), Some(io_timeout)) = (self.duration, self.io_timeout) {
            if io_timeout < duration {
                return Err(format!(
                    "--io-timeout ({}s) must not be shorter than --duration ({}s)",
                    io_timeout, duration
                ));
            }
        }

        if self.mode == Some(TestMode::Latency) && self.no_retain {
            return Err("--no-retain has no effect in latency mode".to_string());
        }

        if let Some(ref user_agent) = self.user_agent {
            if user_agent.trim().is_empty() {
                return Err("--user-agent cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a duration given in whole seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Duration cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
