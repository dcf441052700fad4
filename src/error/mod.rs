//! Error handling for the routing harness
//!
//! Only setup problems and run-level failures are errors. A probe that times
//! out or hits a socket error is an outcome value, never an `AppError`.

use thiserror::Error;

/// Custom error types for the routing harness
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input handed to a harness operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A run exceeded its external deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (addresses, numbers, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// The target was probed but did not behave as expected
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new verification error
    pub fn verification<S: Into<String>>(message: S) -> Self {
        Self::Verification(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Verification(_) => "VERIFY",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if running the same invocation again may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Verification(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => false,
            Self::Io(_) | Self::Internal(_) => false,
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::Verification(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Timeout(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Verification(_) | Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

impl From<regex::Error> for AppError {
    fn from(error: regex::Error) -> Self {
        Self::config(format!("Invalid backend marker pattern: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Probe worker failed: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for user feedback on stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose && error.is_recoverable() {
            eprintln!("This may be caused by network flakiness. Running the harness again can help.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("zero concurrency");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let timeout_error = AppError::timeout("run deadline elapsed");
        assert_eq!(timeout_error.category(), "TIMEOUT");
        assert!(timeout_error.is_recoverable());
        assert_eq!(timeout_error.exit_code(), 3);
    }

    #[test]
    fn test_verification_exit_code() {
        let error = AppError::verification("1 of 3 routes misrouted");
        assert_eq!(error.exit_code(), 6);
        assert_eq!(error.to_string(), "Verification failed: 1 of 3 routes misrouted");
    }

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "abc".parse::<u16>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");
    }

    #[test]
    fn test_console_formatting_without_color() {
        let error = AppError::timeout("run deadline elapsed");
        let formatted = error.format_for_console(false);
        assert_eq!(formatted, "[TIMEOUT] Timeout error: run deadline elapsed");
    }
}
