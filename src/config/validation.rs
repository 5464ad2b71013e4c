//! Configuration validation utilities and rules

use crate::{
    catalog::{Endpoint, EndpointCatalog},
    config::env::EnvManager,
    error::Result,
    models::Config,
    types::TestMode,
};
use colored::Colorize;

/// Configuration validator with advisory checks beyond `Config::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration and catalog, returning non-fatal warnings
    pub fn validate_comprehensive(config: &Config, catalog: &EndpointCatalog) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        config.validate()?;
        catalog.validate()?;

        warnings.extend(Self::validate_endpoints(config, catalog));
        warnings.extend(Self::validate_performance_settings(config));
        warnings.extend(
            EnvManager::validate_current_env()
                .into_iter()
                .map(|message| ValidationWarning::new(ValidationLevel::Warning, message)),
        );

        Ok(warnings)
    }

    /// Check the endpoints the configured mode will actually touch
    fn validate_endpoints(config: &Config, catalog: &EndpointCatalog) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut in_use: Vec<(&str, &[Endpoint])> = Vec::new();
        if config.mode.includes_download() {
            in_use.push(("download", &catalog.download));
        }
        if config.mode.includes_upload() {
            in_use.push(("upload", &catalog.upload));
        }
        if config.mode.includes_latency() {
            in_use.push(("latency", &catalog.latency));
        }

        for (phase, endpoints) in in_use {
            let plain = endpoints.iter().filter(|e| e.is_plain_http()).count();
            if plain > 0 && phase != "latency" {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "{} of {} {} endpoints use plain HTTP; transparent proxies may distort throughput",
                        plain,
                        endpoints.len(),
                        phase
                    ),
                ));
            }

            for endpoint in endpoints.iter().filter(|e| Self::is_local(e)) {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "{} endpoint '{}' ({}) targets a private/local network and will not measure internet speed",
                        phase, endpoint.label, endpoint.url
                    ),
                ));
            }
        }

        warnings
    }

    fn validate_performance_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.mode != TestMode::Latency {
            if config.probe_duration_secs < 3 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Probe duration of {}s is too short for TCP to ramp up; rates will read low",
                        config.probe_duration_secs
                    ),
                ));
            } else if config.probe_duration_secs > 60 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "Long probe duration of {}s per endpoint; a run with fallbacks may take minutes",
                        config.probe_duration_secs
                    ),
                ));
            }
        }

        if config.mode == TestMode::Both && !config.retain_payload {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Payload retention disabled; upload will send synthetic filler".to_string(),
            ));
        }

        warnings
    }

    fn is_local(endpoint: &Endpoint) -> bool {
        match url::Url::parse(&endpoint.url).ok().and_then(|u| u.host().map(|h| h.to_owned())) {
            Some(url::Host::Ipv4(ip)) => ip.is_private() || ip.is_loopback() || ip.is_link_local(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            Some(url::Host::Domain(domain)) => domain == "localhost" || domain.ends_with(".local"),
            None => false,
        }
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config, catalog: &EndpointCatalog) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config, catalog)
}
