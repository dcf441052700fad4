//! Structured logging system for the routing harness
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Console and JSON output formats
//! - Correlation IDs tying every probe of a run to that run
//! - A session ID and shared context fields stamped on every entry of one invocation
//! - Specialized loggers for probe events and run lifecycles
//!
//! Every entry goes to stderr so that the JSON report on stdout stays parseable.

use crate::error::{AppError, Result};
use crate::models::{AttributedOutcome, Config, Endpoint, LoadRunResult};
use crate::types::RunMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    /// Global correlation ID for the session
    session_id: Option<String>,
    /// Additional context fields
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: &str) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: &str, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// A logger that drops everything, for library callers that want silence
    pub fn silent(name: &str) -> Self {
        let mut logger = Self::new(name);
        logger.min_level = LogLevel::Fatal;
        logger
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
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

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Write log entry to stderr
    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = self.render(&entry);
        let _ = writeln!(io::stderr(), "{}", output);
    }

    /// Render an entry in the configured format
    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
        }
    }

    /// Format log entry for console output
    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        output
    }

    /// Format log entry as JSON
    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}",
                entry.message
            ),
        }
    }

}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add outcome kind, latency and backend of a probe
    pub fn outcome(self, attributed: &AttributedOutcome) -> Self {
        let latency_ms = attributed.outcome.latency().map(|l| l.as_secs_f64() * 1000.0);
        self.field("outcome", attributed.outcome.kind())
            .field("latency_ms", latency_ms)
            .field("backend", &attributed.backend_id)
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }

    #[cfg(test)]
    fn into_entry(self) -> LogEntry {
        self.entry
    }
}

/// Logger for individual probe exchanges
#[derive(Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Logger::with_config("PROBE", config))
    }

    pub fn silent() -> Self {
        Self::new(Logger::silent("PROBE"))
    }

    /// Stamp every later entry with the invocation's session ID and mode
    pub async fn attach_session(&self, session_id: &str, mode: RunMode) {
        self.logger.set_session_id(session_id.to_string()).await;
        self.logger.add_context_field("mode", mode.as_str()).await;
    }

    /// Log the attributed outcome of one probe; failures are logged at info level
    pub async fn log_outcome(&self, endpoint: &Endpoint, attributed: &AttributedOutcome, correlation_id: Option<&str>) {
        let level = if attributed.outcome.is_success() {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        if !self.logger.would_log(level) {
            return;
        }

        let message = match (&attributed.outcome, &attributed.backend_id) {
            (crate::models::ProbeOutcome::Success { latency, .. }, Some(backend)) => format!(
                "{} answered by {} in {:.2}ms",
                endpoint,
                backend,
                latency.as_secs_f64() * 1000.0
            ),
            (crate::models::ProbeOutcome::Success { latency, .. }, None) => format!(
                "{} answered without backend tag in {:.2}ms",
                endpoint,
                latency.as_secs_f64() * 1000.0
            ),
            (crate::models::ProbeOutcome::Timeout { waited }, _) => {
                format!("{} timed out after {}ms", endpoint, waited.as_millis())
            }
            (crate::models::ProbeOutcome::TransportError { detail }, _) => {
                format!("{} transport error: {}", endpoint, detail)
            }
        };

        let mut builder = self
            .logger
            .log(level, &message)
            .field("endpoint", endpoint.to_string())
            .outcome(attributed);
        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }
        builder.log().await;
    }
}

/// Logger for run lifecycles with correlation IDs
#[derive(Clone)]
pub struct RunLogger {
    logger: Logger,
}

impl RunLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Logger::with_config("RUN", config))
    }

    pub fn silent() -> Self {
        Self::new(Logger::silent("RUN"))
    }

    /// Stamp every later entry with the invocation's session ID and mode
    pub async fn attach_session(&self, session_id: &str, mode: RunMode) {
        self.logger.set_session_id(session_id.to_string()).await;
        self.logger.add_context_field("mode", mode.as_str()).await;
    }

    /// Log the start of a run and return its correlation ID
    pub async fn start_run(&self, endpoint: &Endpoint, total_requests: usize, concurrency: usize) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.logger
            .info(&format!(
                "Starting run against {}: {} requests, {} workers",
                endpoint, total_requests, concurrency
            ))
            .correlation_id(&correlation_id)
            .field("endpoint", endpoint.to_string())
            .field("total_requests", total_requests)
            .field("concurrency", concurrency)
            .field("operation_type", "start")
            .log()
            .await;
        correlation_id
    }

    /// Log the summary of a finished run
    pub async fn end_run(&self, correlation_id: &str, result: &LoadRunResult) {
        self.logger
            .info(&format!(
                "Run completed: {}/{} succeeded in {:.3}s ({:.1} req/s)",
                result.succeeded,
                result.total_requests,
                result.total_duration.as_secs_f64(),
                result.throughput()
            ))
            .correlation_id(correlation_id)
            .field("succeeded", result.succeeded)
            .field("failed", result.failed)
            .field("timed_out", result.timed_out)
            .field("transport_errors", result.transport_errors)
            .field("unattributed", result.unattributed)
            .field("success_rate", result.success_rate())
            .field("per_backend_counts", &result.per_backend_counts)
            .field("p95_ms", result.latency.p95_ms)
            .field("operation_type", "end")
            .log()
            .await;
    }

    /// Log a run that was cut short by its external deadline
    pub async fn deadline_exceeded(&self, correlation_id: &str, deadline: Duration) {
        self.logger
            .error(&format!("Run exceeded its {}ms deadline; in-flight probes discarded", deadline.as_millis()))
            .correlation_id(correlation_id)
            .field("deadline_ms", deadline.as_millis() as u64)
            .field("operation_type", "deadline")
            .log()
            .await;
    }

    /// Log a phase-level message (smoke check, verification)
    pub async fn phase(&self, phase: &str, message: &str, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        self.logger
            .log(level, message)
            .field("phase", phase)
            .field("success", success)
            .log()
            .await;
    }

    /// Log an error that ended an invocation
    pub async fn log_error(&self, error: &AppError, context: &str) {
        self.logger
            .error(&format!("{}: {}", context, error))
            .error_info(error)
            .log()
            .await;
    }
}
