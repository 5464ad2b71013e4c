//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    models::metrics::{mbps_to_megabytes_per_sec, LatencyAggregate, RateObservation, TestRun, ThroughputReport},
    types::Direction,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format a phase transition
    fn format_progress(&self, message: &str) -> Result<String>;

    /// Format one live throughput observation
    fn format_live_rate(&self, direction: Direction, observation: &RateObservation) -> Result<String>;

    /// Format a diagnostic line from the engine
    fn format_log_line(&self, line: &str) -> Result<String>;

    /// Format the headline result of a throughput phase
    fn format_throughput(&self, direction: Direction, report: &ThroughputReport) -> Result<String>;

    /// Format per-host latency results with the aggregate line
    fn format_latency(&self, aggregate: &LatencyAggregate) -> Result<String>;

    /// Format a finished run
    fn format_test_run(&self, run: &TestRun) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show every endpoint attempt, not just the winner
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum cell width
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 120,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: 4,
        }
    }
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Pad `text` to `width` characters
pub(crate) fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

/// Widths that fit every header and cell, capped at `max_width`
pub(crate) fn column_widths(columns: &[Column], rows: &[RowData], max_width: usize) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .chain([column.header.chars().count(), column.min_width])
                .max()
                .unwrap_or(column.min_width)
                .min(max_width)
        })
        .collect()
}

/// Human-readable duration
pub(crate) fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Human-readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub(crate) fn direction_title(direction: Direction) -> &'static str {
    match direction {
        Direction::Download => "Download",
        Direction::Upload => "Upload",
    }
}

/// Latency table columns and one row per probed host
pub(crate) fn latency_rows(aggregate: &LatencyAggregate) -> (Vec<Column>, Vec<RowData>) {
    let columns = vec![
        Column::new("Host", Alignment::Left),
        Column::new("Round trip", Alignment::Right),
        Column::new("Status", Alignment::Left),
    ];
    let rows = aggregate
        .results
        .iter()
        .map(|result| {
            let status = match (result.http_status, &result.error_message) {
                (Some(code), _) if result.is_successful() => format!("HTTP {}", code),
                (_, Some(reason)) => reason.clone(),
                _ => "no response".to_string(),
            };
            vec![result.host_label.clone(), result.format_round_trip(), status]
        })
        .collect();
    (columns, rows)
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given columns and data
    fn create_table(&self, columns: &[Column], rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let widths = column_widths(columns, rows, self.options.max_width);
        let mut output = String::new();

        if self.options.table_borders {
            output.push_str(&self.create_horizontal_border(&widths));
            output.push('\n');
        }
        let headers: RowData = columns.iter().map(|c| c.header.clone()).collect();
        output.push_str(&self.create_row(&headers, &widths, columns));
        output.push('\n');
        if self.options.table_borders {
            output.push_str(&self.create_horizontal_border(&widths));
            output.push('\n');
        }

        for row in rows {
            output.push_str(&self.create_row(row, &widths, columns));
            output.push('\n');
        }

        if self.options.table_borders {
            output.push_str(&self.create_horizontal_border(&widths));
        }

        output
    }

    fn create_row(&self, data: &[String], widths: &[usize], columns: &[Column]) -> String {
        let mut row = String::new();

        if self.options.table_borders {
            row.push('|');
        }

        for ((cell, &width), column) in data.iter().zip(widths).zip(columns) {
            let padded_cell = align_text(cell, width, column.alignment);
            if self.options.table_borders {
                row.push(' ');
                row.push_str(&padded_cell);
                row.push_str(" |");
            } else {
                row.push_str(&padded_cell);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_progress(&self, message: &str) -> Result<String> {
        Ok(format!(">> {}", message))
    }

    fn format_live_rate(&self, direction: Direction, observation: &RateObservation) -> Result<String> {
        Ok(format!(
            "   {:<8} {:>9.2} Mbps  (avg {:.2} Mbps, {:.1}s)",
            direction.as_str(),
            observation.instantaneous_mbps,
            observation.average_mbps,
            observation.elapsed.as_secs_f64()
        ))
    }

    fn format_log_line(&self, line: &str) -> Result<String> {
        Ok(format!("   - {}", line))
    }

    fn format_throughput(&self, direction: Direction, report: &ThroughputReport) -> Result<String> {
        let mut output = String::new();

        write!(
            output,
            "{:<9} {} via {}",
            format!("{}:", direction_title(direction)),
            report.statistics.format_avg(),
            report.endpoint_label
        )
        .map_err(fmt_err)?;

        if let Some(source) = report.payload_source {
            write!(output, " [payload: {}]", source).map_err(fmt_err)?;
        }

        if self.options.verbose_mode {
            write!(output, "\n          {} transferred", format_bytes(report.bytes_transferred)).map_err(fmt_err)?;
            for attempt in report.attempts.iter().filter(|a| !a.is_successful()) {
                write!(
                    output,
                    "\n          skipped {}: {}",
                    attempt.endpoint_label,
                    attempt.error_message.as_deref().unwrap_or("failed")
                )
                .map_err(fmt_err)?;
            }
        } else if report.failed_attempts() > 0 {
            write!(output, " ({} endpoint(s) skipped)", report.failed_attempts()).map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_latency(&self, aggregate: &LatencyAggregate) -> Result<String> {
        let mut output = String::new();
        let (columns, rows) = latency_rows(aggregate);

        writeln!(output, "{}", self.create_table(&columns, &rows)).map_err(fmt_err)?;

        match (aggregate.average, aggregate.min, aggregate.max) {
            (Some(avg), Some(min), Some(max)) => write!(
                output,
                "Latency:  avg {}, min {}, max {} ({}/{} hosts answered)",
                format_duration(avg),
                format_duration(min),
                format_duration(max),
                aggregate.success_count,
                aggregate.total_count
            ),
            _ => write!(
                output,
                "Latency:  no host answered (0/{})",
                aggregate.total_count
            ),
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
            sections.push(format!(
                "Completed in {}",
                format_duration(duration.num_milliseconds() as f64)
            ));
        }

        Ok(sections.join("\n"))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("OK: {}", message))
    }
}

/// MB/s figure shown next to a Mbps rate
pub(crate) fn megabytes_label(mbps: f64) -> String {
    format!("{:.2} MB/s", mbps_to_megabytes_per_sec(mbps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::{LatencyResult, ProbeResult};
    use crate::types::{PayloadSource, TestMode};
    use std::time::Duration;
    use uuid::Uuid;

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        })
    }

    fn download_report() -> ThroughputReport {
        let attempts = vec![
            ProbeResult::failed("Mirror A", "http://a.test/f", "HTTP 403"),
            ProbeResult::measured("Mirror B", "http://b.test/f", 6_250_000, Duration::from_secs(1)),
        ];
        ThroughputReport::from_attempts(attempts, None).unwrap()
    }

    fn latency() -> LatencyAggregate {
        LatencyAggregate::from_results(vec![
            LatencyResult::success("Baidu", "http://www.baidu.com", 10.0, 200),
            LatencyResult::no_response("Google", "http://www.google.com", "no answer within 5s"),
            LatencyResult::success("Bing", "http://www.bing.com", 30.0, 301),
        ])
    }

    #[test]
    fn test_header() {
        let header = plain(false).format_header("Results").unwrap();
        assert_eq!(header, "===========\n  Results  \n===========");
    }

    #[test]
    fn test_throughput_headline() {
        let line = plain(false).format_throughput(Direction::Download, &download_report()).unwrap();
        assert!(line.starts_with("Download:"));
        assert!(line.contains("50.00 Mbps (6.25 MB/s)"));
        assert!(line.contains("via Mirror B"));
        assert!(line.contains("1 endpoint(s) skipped"));
    }

    #[test]
    fn test_verbose_throughput_lists_skipped() {
        let text = plain(true).format_throughput(Direction::Download, &download_report()).unwrap();
        assert!(text.contains("skipped Mirror A: HTTP 403"));
        assert!(text.contains("6.2 MB transferred") || text.contains("6.3 MB transferred"));
    }

    #[test]
    fn test_upload_shows_payload_source() {
        let attempts = vec![ProbeResult::measured("Sink", "http://s.test", 1_000_000, Duration::from_secs(1))];
        let report = ThroughputReport::from_attempts(attempts, Some(PayloadSource::RetainedDownload)).unwrap();
        let line = plain(false).format_throughput(Direction::Upload, &report).unwrap();
        assert!(line.contains("[payload: retained download]"));
    }

    #[test]
    fn test_latency_table() {
        let text = plain(false).format_latency(&latency()).unwrap();
        assert!(text.contains("| Host"));
        assert!(text.contains("timed out"));
        assert!(text.contains("no answer within 5s"));
        assert!(text.contains("avg 20.0ms, min 10.0ms, max 30.0ms (2/3 hosts answered)"));
    }

    #[test]
    fn test_live_rate_line() {
        let observation = RateObservation {
            instantaneous_mbps: 42.5,
            average_mbps: 40.0,
            elapsed: Duration::from_secs(3),
        };
        let line = plain(false).format_live_rate(Direction::Upload, &observation).unwrap();
        assert!(line.contains("upload"));
        assert!(line.contains("42.50 Mbps"));
        assert!(line.contains("avg 40.00 Mbps, 3.0s"));
    }

    #[test]
    fn test_full_run() {
        let mut run = TestRun::new(Uuid::new_v4(), TestMode::Download);
        run.download = Some(download_report());
        let text = plain(false).format_test_run(&run.complete()).unwrap();
        assert!(text.contains("Speed Test Results (download)"));
        assert!(text.contains("Completed in"));
        assert!(!text.contains("Upload:"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(format_duration(12.34), "12.3ms");
        assert_eq!(format_duration(1500.0), "1.50s");
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(2_500_000), "2.5 MB");
        assert_eq!(align_text("ab", 4, Alignment::Right), "  ab");
        assert_eq!(megabytes_label(80.0), "10.00 MB/s");
    }
}
