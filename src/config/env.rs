//! Environment variable handling and .env file loading

use crate::error::{AppError, Result};
use crate::types::TestMode;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists. Variables already set in the process win.
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "TEST_MODE" => {
                value
                    .parse::<TestMode>()
                    .map_err(|e| AppError::config(format!("Invalid TEST_MODE value '{}': {}", value, e)))?;
            }
            "PROBE_DURATION" => Self::check_range(key, value, 1, 120)?,
            "IO_TIMEOUT" => Self::check_range(key, value, 1, 300)?,
            "CONNECT_TIMEOUT" => Self::check_range(key, value, 1, 60)?,
            "LATENCY_TIMEOUT" => Self::check_range(key, value, 1, 5)?,
            "MAX_RETAINED_MB" => Self::check_range(key, value, 1, 2048)?,
            "RETAIN_PAYLOAD" | "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "ENDPOINT_CATALOG" => {
                if !Path::new(value.trim()).is_file() {
                    return Err(AppError::config(format!("ENDPOINT_CATALOG file not found: {}", value)));
                }
            }
            "USER_AGENT" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("USER_AGENT cannot be empty"));
                }
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    fn check_range(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
        let parsed: u64 = value
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
        if parsed < min || parsed > max {
            return Err(AppError::config(format!(
                "{} must be between {} and {}, got: {}",
                key, min, max, parsed
            )));
        }
        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TEST_MODE", "Phases to measure (download/upload/both/latency)", "both"),
            ("PROBE_DURATION", "Time budget per probe in seconds (1-120)", "10"),
            ("IO_TIMEOUT", "Stalled read/response ceiling in seconds (1-300)", "30"),
            ("CONNECT_TIMEOUT", "Connection timeout in seconds (1-60)", "10"),
            ("LATENCY_TIMEOUT", "Per-host latency timeout in seconds (1-5)", "5"),
            ("RETAIN_PAYLOAD", "Reuse downloaded bytes as upload payload", "true"),
            ("MAX_RETAINED_MB", "Cap on retained download bytes in MB (1-2048)", "256"),
            ("ENDPOINT_CATALOG", "Path to a JSON endpoint catalog", "./endpoints.json"),
            ("USER_AGENT", "User-Agent header for every request", "Mozilla/5.0 ..."),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value).err().map(|e| e.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("TEST_MODE", "latency").is_ok());
        assert!(EnvManager::validate_env_var("PROBE_DURATION", "10").is_ok());
        assert!(EnvManager::validate_env_var("IO_TIMEOUT", "300").is_ok());
        assert!(EnvManager::validate_env_var("LATENCY_TIMEOUT", "5").is_ok());
        assert!(EnvManager::validate_env_var("RETAIN_PAYLOAD", "false").is_ok());
        assert!(EnvManager::validate_env_var("USER_AGENT", "curl/8").is_ok());

        assert!(EnvManager::validate_env_var("TEST_MODE", "sideways").is_err());
        assert!(EnvManager::validate_env_var("PROBE_DURATION", "0").is_err());
        assert!(EnvManager::validate_env_var("PROBE_DURATION", "121").is_err());
        assert!(EnvManager::validate_env_var("LATENCY_TIMEOUT", "6").is_err());
        assert!(EnvManager::validate_env_var("MAX_RETAINED_MB", "abc").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
        assert!(EnvManager::validate_env_var("ENDPOINT_CATALOG", "/definitely/not/here.json").is_err());
        assert!(EnvManager::validate_env_var("USER_AGENT", " ").is_err());
    }

    #[test]
    fn test_catalog_path_must_exist() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        assert!(EnvManager::validate_env_var("ENDPOINT_CATALOG", &path).is_ok());
    }

    #[test]
    fn test_unknown_variables_ignored() {
        assert!(EnvManager::validate_env_var("HOME", "anything").is_ok());
    }

    #[test]
    fn test_supported_env_vars_listed() {
        let vars = EnvManager::get_supported_env_vars();
        assert_eq!(vars.len(), 10);
        assert!(vars.iter().any(|(name, _, _)| *name == "TEST_MODE"));
        assert!(vars.iter().any(|(name, _, _)| *name == "ENDPOINT_CATALOG"));
    }

    #[test]
    fn test_validate_current_env_reports_bad_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (var_name, _, _) in EnvManager::get_supported_env_vars() {
            std::env::remove_var(var_name);
        }
        assert!(EnvManager::validate_current_env().is_empty());

        std::env::set_var("PROBE_DURATION", "999");
        let warnings = EnvManager::validate_current_env();
        std::env::remove_var("PROBE_DURATION");

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("PROBE_DURATION"));
    }
}
