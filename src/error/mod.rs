//! Error handling for the internet speed tester

use thiserror::Error;

/// Custom error types for the speed tester
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Bad or conflicting settings from defaults, .env, environment or CLI
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input that parsed but breaks a rule (empty list, bad scheme)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Text that could not be parsed (catalog JSON, URLs, numbers)
    #[error("Could not parse {0}")]
    Parse(String),

    #[error("I/O failure: {0}")]
    Io(String),

    /// Transport-level failure below HTTP
    #[error("Network failure: {0}")]
    Network(String),

    /// HTTP-level failure that is neither a timeout nor a connect error
    #[error("HTTP failure: {0}")]
    HttpRequest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// An endpoint could not be reached (DNS, connect, transport failure)
    #[error("Endpoint unreachable: {0}")]
    EndpointUnreachable(String),

    /// An endpoint answered with a non-success HTTP status
    #[error("Endpoint rejected request: {0}")]
    EndpointRejected(String),

    /// Every endpoint of a required phase failed
    #[error("Phase exhausted: {0}")]
    PhaseExhausted(String),

    /// The run was cancelled by its caller
    #[error("Run cancelled")]
    Cancelled,

    /// A bug: a panicked worker, an impossible state
    #[error("Internal error: {0}")]
    Internal(String),
}

/// `AppError::config("..")` style constructors for every message-carrying variant
macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl AppError {
            $(
                pub fn $name<S: Into<String>>(message: S) -> Self {
                    Self::$variant(message.into())
                }
            )*
        }
    };
}

constructors! {
    config => Config,
    validation => Validation,
    parse => Parse,
    io => Io,
    network => Network,
    http_request => HttpRequest,
    timeout => Timeout,
    endpoint_unreachable => EndpointUnreachable,
    endpoint_rejected => EndpointRejected,
    phase_exhausted => PhaseExhausted,
    internal => Internal,
}

impl AppError {
    /// Short uppercase tag used in logs and console output
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Io(_) => "IO",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::EndpointUnreachable(_) => "UNREACHABLE",
            Self::EndpointRejected(_) => "REJECTED",
            Self::PhaseExhausted(_) => "EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recovered locally by moving on to the next endpoint
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::HttpRequest(_)
            | Self::Timeout(_)
            | Self::EndpointUnreachable(_)
            | Self::EndpointRejected(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Io(_) => false,
            Self::PhaseExhausted(_) | Self::Cancelled | Self::Internal(_) => false,
        }
    }

    /// Whether this outcome is a caller-initiated cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Downgrade an error raised inside a single probe to the endpoint taxonomy.
    ///
    /// Rejections and cancellations keep their identity, everything else
    /// counts as the endpoint being unreachable.
    pub fn into_probe_failure(self) -> Self {
        match self {
            Self::EndpointRejected(_) | Self::EndpointUnreachable(_) | Self::Cancelled => self,
            other => Self::EndpointUnreachable(other.to_string()),
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file, environment variables or command line arguments.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Check the format of your endpoint URLs and numeric limits.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your endpoint catalog file.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file paths and permissions.", msg)
            }
            Self::Network(msg) | Self::EndpointUnreachable(msg) => {
                format!("Network connectivity issue: {}\n\nSuggestion: Check your internet connection and try again.", msg)
            }
            Self::HttpRequest(msg) | Self::EndpointRejected(msg) => {
                format!("HTTP request failed: {}\n\nSuggestion: The test server may be down or blocking requests. Try a different endpoint catalog.", msg)
            }
            Self::Timeout(msg) => {
                format!("Request timed out: {}\n\nSuggestion: Increase the timeout with --io-timeout or check your network connection.", msg)
            }
            Self::PhaseExhausted(msg) => {
                format!("Measurement failed: {}\n\nSuggestion: Every endpoint failed. Check connectivity or provide your own catalog with --catalog.", msg)
            }
            Self::Cancelled => "The run was cancelled.".to_string(),
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) | Self::EndpointUnreachable(_) | Self::EndpointRejected(_) => 2,
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::PhaseExhausted(_) => 6,
            Self::Cancelled => 130,
            Self::Internal(_) => 99,
        }
    }

    /// `[CATEGORY] message`, tinted by error family when color is on
    pub fn format_for_console(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.category());
        let message = self.to_string();
        if !use_color {
            return format!("{} {}", tag, message);
        }

        use colored::{Color, Colorize};
        let color = match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::HttpRequest(_) | Self::EndpointUnreachable(_) | Self::EndpointRejected(_) => {
                Color::Yellow
            }
            Self::Timeout(_) => Color::Blue,
            Self::Io(_) | Self::PhaseExhausted(_) | Self::Cancelled => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        };
        format!("{} {}", tag.color(color).bold(), message.color(color))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!(".env file: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("integer: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("number: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("boolean: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Worker task failed: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix an error with what was being attempted
pub trait ErrorContext<T> {
    /// Config, parse and I/O errors keep their category; anything else
    /// becomes internal
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let context = f();
            match e.into() {
                AppError::Config(msg) => AppError::Config(format!("{}: {}", context, msg)),
                AppError::Parse(msg) => AppError::Parse(format!("{}: {}", context, msg)),
                AppError::Io(msg) => AppError::Io(format!("{}: {}", context, msg)),
                other => AppError::internal(format!("{}: {}", context, other)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let unreachable = AppError::endpoint_unreachable("connection refused");
        assert_eq!(unreachable.category(), "UNREACHABLE");
        assert!(unreachable.is_recoverable());
        assert_eq!(unreachable.exit_code(), 2);
    }

    #[test]
    fn test_error_display() {
        let error = AppError::phase_exhausted("all download endpoints failed");
        let display = error.to_string();
        assert!(display.contains("Phase exhausted"));
        assert!(display.contains("all download endpoints failed"));
        assert_eq!(AppError::Cancelled.to_string(), "Run cancelled");
    }

    #[test]
    fn test_endpoint_errors_are_recoverable_phase_errors_are_not() {
        assert!(AppError::endpoint_unreachable("x").is_recoverable());
        assert!(AppError::endpoint_rejected("HTTP 404").is_recoverable());
        assert!(AppError::timeout("x").is_recoverable());
        assert!(!AppError::phase_exhausted("x").is_recoverable());
        assert!(!AppError::Cancelled.is_recoverable());
        assert!(AppError::Cancelled.is_cancellation());
        assert!(!AppError::internal("x").is_cancellation());
    }

    #[test]
    fn test_into_probe_failure() {
        let downgraded = AppError::timeout("read stalled").into_probe_failure();
        assert!(matches!(downgraded, AppError::EndpointUnreachable(ref m) if m.contains("read stalled")));

        let downgraded = AppError::internal("probe panicked").into_probe_failure();
        assert_eq!(downgraded.category(), "UNREACHABLE");

        let kept = AppError::endpoint_rejected("HTTP 403").into_probe_failure();
        assert_eq!(kept.category(), "REJECTED");

        assert!(AppError::Cancelled.into_probe_failure().is_cancellation());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("test").exit_code(), 1);
        assert_eq!(AppError::network("test").exit_code(), 2);
        assert_eq!(AppError::timeout("test").exit_code(), 3);
        assert_eq!(AppError::io("test").exit_code(), 5);
        assert_eq!(AppError::phase_exhausted("test").exit_code(), 6);
        assert_eq!(AppError::Cancelled.exit_code(), 130);
        assert_eq!(AppError::internal("test").exit_code(), 99);
    }

    #[test]
    fn test_user_friendly_messages() {
        let error = AppError::phase_exhausted("no upload sink accepted data");
        let message = error.user_friendly_message();
        assert!(message.contains("Measurement failed"));
        assert!(message.contains("Suggestion:"));
        assert!(message.contains("no upload sink accepted data"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "not_a_number".parse::<i32>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let bool_error = "maybe".parse::<bool>().unwrap_err();
        let app_error: AppError = bool_error.into();
        assert!(app_error.to_string().contains("Could not parse boolean"));
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let url_error = url::Url::parse("not-a-valid-url").unwrap_err();
        let app_error: AppError = url_error.into();
        assert_eq!(app_error.category(), "PARSE");
        assert_eq!(app_error.to_string(), "Could not parse URL: relative URL without a base");
    }

    #[test]
    fn test_json_parse_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let app_error: AppError = json_error.into();
        assert_eq!(app_error.category(), "PARSE");
        assert!(app_error.to_string().starts_with("Could not parse JSON: "));
    }

    #[test]
    fn test_dotenv_error_conversion() {
        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        let app_error: AppError = dotenv_error.into();
        assert_eq!(app_error.category(), "CONFIG");
    }

    #[test]
    fn test_error_context_keeps_category() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let error = result
            .with_context(|| "While reading catalog".to_string())
            .unwrap_err();
        assert_eq!(error.category(), "IO");
        assert!(error.to_string().contains("While reading catalog"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::endpoint_rejected("HTTP 503");
        let plain = error.format_for_console(false);
        let colored = error.format_for_console(true);

        assert!(plain.starts_with("[REJECTED]"));
        assert!(plain.contains("HTTP 503"));
        assert!(colored.contains("REJECTED"));
        assert!(colored.contains("HTTP 503"));
    }
}
