//! Structured diagnostic logging
//!
//! Entries carry a level, the emitting component, an optional run id and
//! arbitrary JSON fields. They are rendered as console lines, JSON objects
//! or compact one-liners and always written to stderr, leaving stdout to
//! results.

use crate::error::AppError;
use crate::models::metrics::{LatencyResult, ProbeResult};
use crate::models::Config;
use crate::types::Direction;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Severity of a log entry, ordered from chattiest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// The run cannot continue
    Fatal,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Right-aligned label, colored per severity
    fn painted(&self, use_color: bool) -> String {
        let label = format!("{:>5}", self.label());
        if !use_color {
            return label;
        }
        match self {
            LogLevel::Trace => label.white().to_string(),
            LogLevel::Debug => label.cyan().to_string(),
            LogLevel::Info => label.green().to_string(),
            LogLevel::Warn => label.yellow().to_string(),
            LogLevel::Error => label.red().to_string(),
            LogLevel::Fatal => label.magenta().bold().to_string(),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Name of the emitting logger
    pub component: String,
    pub message: String,
    /// Run (or other operation) this entry belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LogLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// How entries are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Timestamped human-readable line
    Console,
    /// One JSON object per line
    Json,
    /// Time, level initial, component and message only
    Compact,
}

/// Fields stamped onto every entry of a logger and its clones
#[derive(Debug, Default)]
struct SharedContext {
    session_id: Option<String>,
    fields: BTreeMap<String, Value>,
}

/// Structured logger. Clones share their session context.
#[derive(Clone)]
pub struct Logger {
    component: String,
    threshold: LogLevel,
    format: LogFormat,
    use_color: bool,
    show_location: bool,
    shared: Arc<RwLock<SharedContext>>,
}

impl Logger {
    pub fn new(component: String) -> Self {
        Self {
            component,
            threshold: LogLevel::Info,
            format: LogFormat::Console,
            use_color: true,
            show_location: false,
            shared: Arc::new(RwLock::new(SharedContext::default())),
        }
    }

    /// Logger tuned from the run configuration.
    ///
    /// Debug mode logs everything from DEBUG up as JSON with source
    /// locations, verbose mode logs INFO and above, otherwise only warnings
    /// and errors are written.
    pub fn with_config(component: String, config: &Config) -> Self {
        let threshold = match (config.debug, config.verbose) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Info,
            (false, false) => LogLevel::Warn,
        };

        Self {
            threshold,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            use_color: config.enable_color,
            show_location: config.debug,
            ..Self::new(component)
        }
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn name(&self) -> &str {
        &self.component
    }

    /// Tag every later entry with a session id
    pub async fn set_session_id(&self, session_id: String) {
        self.shared.write().await.session_id = Some(session_id);
    }

    /// Attach a field to every later entry
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.shared.write().await.fields.insert(key, value);
        }
    }

    pub async fn begin_operation(&self, correlation_id: &str, operation_name: &str) {
        self.info(&format!("{} started", operation_name))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("phase", "begin")
            .log()
            .await;
    }

    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        let outcome = if success { "succeeded" } else { "did not succeed" };
        self.info(&format!("{} {}", operation_name, outcome))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("phase", "end")
            .field("success", success)
            .log()
            .await;
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                component: self.component.clone(),
                message: message.to_string(),
                run_id: None,
                fields: BTreeMap::new(),
                location: None,
            },
        }
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }

    async fn emit(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        {
            let shared = self.shared.read().await;
            if let Some(session_id) = &shared.session_id {
                entry.fields.insert("session_id".to_string(), Value::String(session_id.clone()));
            }
            for (key, value) in &shared.fields {
                entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let line = self.render(&entry);
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }

    /// Render an entry in this logger's format
    pub fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.render_console(entry),
            LogFormat::Json => serde_json::to_string(entry).unwrap_or_else(|e| {
                format!("{{\"level\":\"error\",\"message\":\"unserializable log entry: {}\"}}", e)
            }),
            LogFormat::Compact => {
                let initial = entry.level.label().chars().next().unwrap_or('?');
                format!(
                    "{} {} {}: {}",
                    entry.timestamp.format("%H:%M:%S"),
                    initial,
                    entry.component,
                    entry.message
                )
            }
        }
    }

    fn render_console(&self, entry: &LogEntry) -> String {
        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level.painted(self.use_color),
            entry.component,
            entry.message
        );

        if let Some(run_id) = &entry.run_id {
            let short: String = run_id.chars().take(8).collect();
            line.push_str(&format!(" (run {})", short));
        }

        if !entry.fields.is_empty() {
            let fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            line.push_str(&format!(" {{{}}}", fields.join(" ")));
        }

        if self.show_location {
            if let Some(location) = &entry.location {
                line.push_str(&format!(" at {}:{}", location.file, location.line));
            }
        }

        line
    }
}

/// Entry under construction; written by [`LogEntryBuilder::log`]
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.run_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Numbers of one endpoint attempt
    pub fn probe(self, result: &ProbeResult) -> Self {
        self.field("endpoint", &result.endpoint_label)
            .field("url", &result.endpoint_url)
            .field("bytes", result.bytes_transferred)
            .field("elapsed_ms", result.elapsed.as_millis() as u64)
            .field("rate_mbps", result.rate_mbps)
            .field("success", result.is_successful())
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    pub fn entry(&self) -> &LogEntry {
        &self.entry
    }

    pub async fn log(self) {
        self.logger.emit(self.entry).await;
    }
}

/// Logger for endpoint attempts and phase outcomes
#[derive(Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("PROBE".to_string(), config),
        }
    }

    /// Wrap an already configured logger
    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// An endpoint attempt is about to start
    pub async fn log_attempt(&self, run_id: &str, direction: Direction, label: &str, url: &str, attempt: usize, total: usize) {
        self.logger
            .debug(&format!("{} attempt {}/{} against {}", direction, attempt, total, label))
            .correlation_id(run_id)
            .field("direction", direction)
            .field("endpoint", label)
            .field("url", url)
            .field("attempt", attempt)
            .log()
            .await;
    }

    /// An endpoint attempt produced a rate
    pub async fn log_probe_success(&self, run_id: &str, direction: Direction, result: &ProbeResult) {
        self.logger
            .info(&format!(
                "{} via {}: {:.2} Mbps",
                direction,
                result.endpoint_label,
                result.rate_mbps.unwrap_or_default()
            ))
            .correlation_id(run_id)
            .field("direction", direction)
            .probe(result)
            .log()
            .await;
    }

    /// An endpoint attempt failed and the next candidate will be tried
    pub async fn log_probe_failure(&self, run_id: &str, direction: Direction, label: &str, error: &AppError) {
        self.logger
            .warn(&format!("{} via {} failed: {}", direction, label, error))
            .correlation_id(run_id)
            .field("direction", direction)
            .field("endpoint", label)
            .error_info(error)
            .log()
            .await;
    }

    /// Every endpoint of a phase failed
    pub async fn log_phase_exhausted(&self, run_id: &str, phase: &str, attempts: usize) {
        self.logger
            .error(&format!("All {} {} endpoints failed", attempts, phase))
            .correlation_id(run_id)
            .field("phase", phase)
            .field("attempts", attempts)
            .log()
            .await;
    }

    /// One latency host was probed
    pub async fn log_latency(&self, run_id: &str, result: &LatencyResult) {
        let level = if result.is_successful() { LogLevel::Debug } else { LogLevel::Warn };
        self.logger
            .log(level, &format!("latency {}: {}", result.host_label, result.format_round_trip()))
            .correlation_id(run_id)
            .field("host", &result.host_label)
            .field("url", &result.url)
            .field("round_trip_ms", result.round_trip_ms)
            .field("http_status", result.http_status)
            .log()
            .await;
    }
}

/// Log at DEBUG with the caller's file and line attached
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn sample_entry() -> LogEntry {
        let mut fields = BTreeMap::new();
        fields.insert("endpoint".to_string(), Value::String("Aliyun Mirror".to_string()));
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            component: "PROBE".to_string(),
            message: "download via Aliyun Mirror: 48.00 Mbps".to_string(),
            run_id: Some("0f3c9a7e-run".to_string()),
            fields,
            location: None,
        }
    }

    #[test]
    fn test_threshold_from_config() {
        let config = Config {
            debug: true,
            enable_color: false,
            ..Default::default()
        };
        let logger = Logger::with_config("TEST".to_string(), &config);
        assert!(logger.would_log(LogLevel::Debug));
        assert!(!logger.would_log(LogLevel::Trace));
        assert_eq!(logger.format, LogFormat::Json);
        assert!(logger.show_location);

        let verbose = Logger::with_config(
            "TEST".to_string(),
            &Config {
                verbose: true,
                ..Default::default()
            },
        );
        assert!(verbose.would_log(LogLevel::Info));

        let quiet = Logger::with_config("TEST".to_string(), &Config::default());
        assert!(!quiet.would_log(LogLevel::Info));
        assert!(quiet.would_log(LogLevel::Warn));
        assert!(quiet.would_log(LogLevel::Fatal));
    }

    #[tokio::test]
    async fn test_shared_context_reaches_clones() {
        let logger = Logger::new("TEST".to_string());
        let clone = logger.clone();
        logger.set_session_id("session-1".to_string()).await;
        clone.add_context_field("mode".to_string(), "both").await;

        let shared = logger.shared.read().await;
        assert_eq!(shared.session_id.as_deref(), Some("session-1"));
        assert_eq!(shared.fields["mode"], "both");
    }

    #[test]
    fn test_render_formats() {
        let mut logger = Logger::new("TEST".to_string());
        logger.set_color(false);
        let entry = sample_entry();

        let console = logger.render(&entry);
        assert!(console.contains(" INFO [PROBE] download via Aliyun Mirror"));
        assert!(console.contains("(run 0f3c9a7e)"));
        assert!(console.contains("endpoint=\"Aliyun Mirror\""));
        assert!(!console.contains('\u{1b}'));

        logger.set_format(LogFormat::Json);
        let json: Value = serde_json::from_str(&logger.render(&entry)).unwrap();
        assert_eq!(json["level"], "info");
        assert_eq!(json["component"], "PROBE");
        assert!(json.get("location").is_none());

        logger.set_format(LogFormat::Compact);
        assert!(logger.render(&entry).ends_with(" I PROBE: download via Aliyun Mirror: 48.00 Mbps"));
    }

    #[test]
    fn test_short_run_id_is_kept_whole() {
        let mut logger = Logger::new("TEST".to_string());
        logger.set_color(false);
        let mut entry = sample_entry();
        entry.run_id = Some("abc".to_string());
        assert!(logger.render(&entry).contains("(run abc)"));
    }

    #[test]
    fn test_builder_probe_and_error_fields() {
        let logger = Logger::new("TEST".to_string());
        let result = ProbeResult::measured("Mirror", "http://m.test/f", 1_250_000, Duration::from_secs(1));
        let builder = logger
            .info("probe")
            .probe(&result)
            .error_info(&AppError::endpoint_rejected("HTTP 403"))
            .location("probe.rs", 7, Some("probe"));

        let entry = builder.entry();
        assert_eq!(entry.fields["rate_mbps"], serde_json::json!(10.0));
        assert_eq!(entry.fields["bytes"], serde_json::json!(1_250_000));
        assert_eq!(entry.fields["error_category"], "REJECTED");
        assert_eq!(entry.location.as_ref().unwrap().line, 7);
    }

    #[tokio::test]
    async fn test_probe_logger_helpers() {
        let probe_logger = ProbeLogger::new(&Config::default());
        assert_eq!(probe_logger.logger().name(), "PROBE");

        let run_id = Uuid::new_v4().to_string();
        let result = ProbeResult::measured("Mirror", "http://m.test/f", 1_000, Duration::from_secs(1));
        probe_logger
            .log_attempt(&run_id, Direction::Download, "Mirror", "http://m.test/f", 1, 3)
            .await;
        probe_logger.log_probe_success(&run_id, Direction::Download, &result).await;
        probe_logger
            .log_probe_failure(&run_id, Direction::Upload, "Sink", &AppError::endpoint_unreachable("refused"))
            .await;
        probe_logger.log_phase_exhausted(&run_id, "upload", 3).await;
        probe_logger
            .log_latency(&run_id, &LatencyResult::no_response("Baidu", "http://www.baidu.com", "timeout"))
            .await;
    }

    #[tokio::test]
    async fn test_operations_and_macros() {
        let logger = Logger::new("TEST".to_string());
        logger.begin_operation("run-1", "speed_test").await;
        crate::log_debug!(logger, "debug {}", 1);
        crate::log_info!(logger, "info {}", 2);
        crate::log_warn!(logger, "warn {}", 3);
        logger.end_operation("run-1", "speed_test", false).await;
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = sample_entry();
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.level, LogLevel::Info);
        assert_eq!(parsed.run_id.as_deref(), Some("0f3c9a7e-run"));
        assert_eq!(parsed.fields["endpoint"], "Aliyun Mirror");
    }
}
