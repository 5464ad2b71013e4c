//! Colored formatter implementation with terminal color support
//!
//! This module provides a rich colored output formatter that uses
//! ANSI colors and Unicode symbols for enhanced visual presentation.

use super::formatter::{
    align_text, column_widths, direction_title, fmt_err, format_bytes, format_duration, latency_rows,
    megabytes_label, FormattingOptions, OutputFormatter,
};
use crate::{
    error::Result,
    models::metrics::{LatencyAggregate, RateObservation, TestRun, ThroughputReport},
    types::Direction,
};
use colored::*;
use std::fmt::Write as _;

/// Throughput classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedLevel {
    Excellent, // >= 100 Mbps
    Good,      // 25-100 Mbps
    Fair,      // 5-25 Mbps
    Poor,      // < 5 Mbps
}

impl SpeedLevel {
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Excellent
        } else if mbps >= 25.0 {
            Self::Good
        } else if mbps >= 5.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

/// Round-trip classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum LatencyLevel {
    Excellent, // < 50ms
    Good,      // 50-100ms
    Fair,      // 100-300ms
    Poor,      // >= 300ms
}

impl LatencyLevel {
    pub fn from_round_trip(time_ms: f64) -> Self {
        if time_ms < 50.0 {
            Self::Excellent
        } else if time_ms < 100.0 {
            Self::Good
        } else if time_ms < 300.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn colorize_bold(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color).bold()
        } else {
            text.normal()
        }
    }

    fn rate_colored(&self, mbps: f64) -> ColoredString {
        let text = format!("{:.2} Mbps", mbps);
        self.colorize_bold(&text, SpeedLevel::from_mbps(mbps).color())
    }

    fn create_section_header(&self, title: &str, icon: &str) -> String {
        if self.options.enable_color {
            format!("{} {}", icon, title.bold().color(self.color_scheme.header))
        } else {
            format!("{} {}", icon, title)
        }
    }

    /// Latency table; cells are padded before coloring so widths stay right
    fn create_latency_table(&self, aggregate: &LatencyAggregate) -> String {
        let (columns, rows) = latency_rows(aggregate);
        if rows.is_empty() {
            return self.colorize("No latency results available.", self.color_scheme.muted).to_string();
        }
        let widths = column_widths(&columns, &rows, self.options.max_width);
        let mut output = String::new();

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(column, &width)| self.bold(&align_text(&column.header, width, column.alignment)).to_string())
            .collect();
        output.push_str(&header.join("  "));
        output.push('\n');
        let rule = "─".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1));
        output.push_str(&self.colorize(&rule, self.color_scheme.border).to_string());

        for (row, result) in rows.iter().zip(&aggregate.results) {
            let color = match result.round_trip_ms {
                Some(ms) => LatencyLevel::from_round_trip(ms).color(),
                None => self.color_scheme.error,
            };
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .zip(&columns)
                .enumerate()
                .map(|(idx, ((cell, &width), column))| {
                    let padded = align_text(cell, width, column.alignment);
                    match idx {
                        1 => self.colorize(&padded, color).to_string(),
                        2 if !result.is_successful() => self.dimmed(&padded).to_string(),
                        _ => padded,
                    }
                })
                .collect();
            output.push('\n');
            output.push_str(cells.join("  ").trim_end());
        }

        output
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();

        let decorated_title = format!("📶 {}", title);
        let border = "═".repeat(decorated_title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        writeln!(output, "  {}  ", self.colorize_bold(&decorated_title, self.color_scheme.header)).map_err(fmt_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_progress(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("▶", self.color_scheme.info), self.bold(message)))
    }

    fn format_live_rate(&self, direction: Direction, observation: &RateObservation) -> Result<String> {
        let arrow = match direction {
            Direction::Download => "↓",
            Direction::Upload => "↑",
        };
        Ok(format!(
            "  {} {:>9}  {}",
            self.colorize(arrow, self.color_scheme.info),
            self.rate_colored(observation.instantaneous_mbps),
            self.dimmed(&format!(
                "avg {:.2} Mbps, {:.1}s",
                observation.average_mbps,
                observation.elapsed.as_secs_f64()
            ))
        ))
    }

    fn format_log_line(&self, line: &str) -> Result<String> {
        Ok(format!("  {}", self.dimmed(line)))
    }

    fn format_throughput(&self, direction: Direction, report: &ThroughputReport) -> Result<String> {
        let mut output = String::new();
        let icon = match direction {
            Direction::Download => "⬇️ ",
            Direction::Upload => "⬆️ ",
        };
        let avg = report.statistics.avg;

        write!(
            output,
            "{} {} {} ({}) via {}",
            self.create_section_header(&format!("{}:", direction_title(direction)), icon),
            self.rate_colored(avg),
            self.colorize(SpeedLevel::from_mbps(avg).description(), SpeedLevel::from_mbps(avg).color()),
            megabytes_label(avg),
            self.colorize(&report.endpoint_label, self.color_scheme.info)
        )
        .map_err(fmt_err)?;

        if let Some(source) = report.payload_source {
            write!(output, " {}", self.dimmed(&format!("[payload: {}]", source))).map_err(fmt_err)?;
        }

        if self.options.verbose_mode {
            write!(output, "\n    {} transferred", format_bytes(report.bytes_transferred)).map_err(fmt_err)?;
            for attempt in report.attempts.iter().filter(|a| !a.is_successful()) {
                write!(
                    output,
                    "\n    {} {}: {}",
                    self.colorize("✗", self.color_scheme.error),
                    attempt.endpoint_label,
                    self.dimmed(attempt.error_message.as_deref().unwrap_or("failed"))
                )
                .map_err(fmt_err)?;
            }
        } else if report.failed_attempts() > 0 {
            write!(
                output,
                " {}",
                self.colorize(
                    &format!("({} endpoint(s) skipped)", report.failed_attempts()),
                    self.color_scheme.warning
                )
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_latency(&self, aggregate: &LatencyAggregate) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("Latency", "⏱️ ")).map_err(fmt_err)?;
        writeln!(output, "{}", self.create_latency_table(aggregate)).map_err(fmt_err)?;

        let answered = format!("{}/{}", aggregate.success_count, aggregate.total_count);
        let answered_color = if aggregate.success_count == aggregate.total_count {
            self.color_scheme.success
        } else if aggregate.success_count == 0 {
            self.color_scheme.error
        } else {
            self.color_scheme.warning
        };

        match (aggregate.average, aggregate.min, aggregate.max) {
            (Some(avg), Some(min), Some(max)) => write!(
                output,
                "avg {}  min {}  max {}  ({} hosts answered)",
                self.colorize_bold(&format_duration(avg), LatencyLevel::from_round_trip(avg).color()),
                format_duration(min),
                format_duration(max),
                self.colorize(&answered, answered_color)
            ),
            _ => write!(output, "{}", self.colorize(&format!("no host answered ({})", answered), answered_color)),
        }
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_test_run(&self, run: &TestRun) -> Result<String> {
        let mut sections = vec![self.format_header(&format!("Speed Test Results ({})", run.mode))?];

        if let Some(download) = &run.download {
            sections.push(self.format_throughput(Direction::Download, download)?);
        }
        if let Some(upload) = &run.upload {
            sections.push(self.format_throughput(Direction::Upload, upload)?);
        }
        if let Some(latency) = &run.latency {
            sections.push(self.format_latency(latency)?);
        }
        if let Some(duration) = run.duration() {
            sections.push(
                self.dimmed(&format!(
                    "Completed in {}",
                    format_duration(duration.num_milliseconds() as f64)
                ))
                .to_string(),
            );
        }

        Ok(sections.join("\n"))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}
