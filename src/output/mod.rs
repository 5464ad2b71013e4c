//! Output formatting and display system
//!
//! This module provides a flexible output formatting system for run events
//! and results, supporting both colored and plain text output.

mod colored;
mod formatter;

pub use self::colored::{ColorScheme, ColoredFormatter, LatencyLevel, SpeedLevel};
pub use self::formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData};

use crate::{error::Result, executor::EngineEvent, models::metrics::TestRun};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter + Send + Sync> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter + Send + Sync> {
        Self::create_formatter(false, true)
    }
}

/// Renders engine events for a terminal
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter + Send + Sync>,
    verbose: bool,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter + Send + Sync>, verbose: bool) -> Self {
        Self { formatter, verbose }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    /// Text for one engine event, `None` when the event is not shown.
    ///
    /// `Log` lines only appear in verbose mode. Terminal events render the
    /// full result or the failure reason.
    pub fn render_event(&self, event: &EngineEvent) -> Result<Option<String>> {
        let text = match event {
            EngineEvent::Progress(message) => self.formatter.format_progress(message)?,
            EngineEvent::LiveRate { direction, observation } => {
                self.formatter.format_live_rate(*direction, observation)?
            }
            EngineEvent::Log(line) if self.verbose => self.formatter.format_log_line(line)?,
            EngineEvent::Log(_) => return Ok(None),
            EngineEvent::Completed(run) => self.render_run(run)?,
            EngineEvent::Failed(error) => self.formatter.format_error(&format!("Speed test failed: {}", error))?,
        };
        Ok(Some(text))
    }

    pub fn render_run(&self, run: &TestRun) -> Result<String> {
        self.formatter.format_test_run(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_factory_picks_formatter() {
        let plain = OutputFormatterFactory::create_formatter(false, false);
        assert_eq!(plain.format_error("boom").unwrap(), "ERROR: boom");

        let colored = OutputFormatterFactory::create_formatter(true, false);
        assert!(colored.format_error("boom").unwrap().contains("boom"));
    }

    #[test]
    fn test_log_lines_need_verbose() {
        let event = EngineEvent::Log("Trying download endpoint 1/3".to_string());

        let quiet = OutputCoordinator::new(OutputFormatterFactory::create_formatter(false, false), false);
        assert!(quiet.render_event(&event).unwrap().is_none());

        let verbose = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter(), true);
        let text = verbose.render_event(&event).unwrap().unwrap();
        assert!(text.contains("Trying download endpoint 1/3"));
    }

    #[test]
    fn test_failure_rendering() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter(), false);
        let event = EngineEvent::Failed(AppError::phase_exhausted("All 3 download endpoints failed"));
        let text = coordinator.render_event(&event).unwrap().unwrap();
        assert!(text.starts_with("ERROR: Speed test failed:"));
        assert!(text.contains("All 3 download endpoints failed"));
    }
}
