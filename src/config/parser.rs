//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        self.load_env_file()?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    fn load_env_file(&self) -> Result<()> {
        EnvManager::load_env_file(self.cli.debug)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(mode) = self.cli.mode {
            config.mode = mode;
        }
        if let Some(duration) = self.cli.duration {
            config.probe_duration_secs = duration;
        }
        if let Some(timeout) = self.cli.io_timeout {
            config.io_timeout_secs = timeout;
        }
        if let Some(timeout) = self.cli.connect_timeout {
            config.connect_timeout_secs = timeout;
        }
        if let Some(timeout) = self.cli.latency_timeout {
            config.latency_timeout_secs = timeout;
        }
        if self.cli.no_retain {
            config.retain_payload = false;
        }
        if let Some(cap) = self.cli.max_retained_mb {
            config.max_retained_mb = cap;
        }
        if let Some(ref path) = self.cli.catalog {
            config.catalog_path = Some(path.clone());
        }
        if let Some(ref user_agent) = self.cli.user_agent {
            config.user_agent = user_agent.clone();
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color || !self.cli.use_colors() {
            config.enable_color = false;
        }

        // CLI-only switches
        config.json_output = self.cli.json;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let summary = [
        format!("Mode: {}", config.mode),
        format!("Probe Duration: {}s", config.probe_duration_secs),
        format!("I/O Timeout: {}s", config.io_timeout_secs),
        format!("Connect Timeout: {}s", config.connect_timeout_secs),
        format!("Latency Timeout: {}s", config.latency_timeout_secs),
        format!("Retain Payload: {} (cap {} MB)", config.retain_payload, config.max_retained_mb),
        format!("Endpoint Catalog: {}", config.catalog_path.as_deref().unwrap_or("built-in")),
        format!("Color Output: {}", config.enable_color),
        format!("JSON Output: {}", config.json_output),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];

    summary.join("\n")
}
