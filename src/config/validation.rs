//! Configuration validation utilities and rules
//!
//! `Config::validate` rejects configurations that cannot run. The checks here
//! run afterwards and only produce warnings about settings that will run but
//! probably not as intended.

use crate::{error::Result, models::Config};
use colored::Colorize;
use std::collections::HashSet;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration and collect advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_routes(config)?);
        warnings.extend(Self::validate_load_settings(config));
        warnings.extend(Self::validate_deadline(config));

        Ok(warnings)
    }

    fn validate_routes(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();
        let routes = config.route_expectations()?;

        if routes.is_empty() && config.mode.runs_verify() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "No routes configured; routing verification will be skipped".to_string(),
            ));
        }

        let backends: HashSet<&str> = routes.iter().map(|r| r.expected_backend.as_str()).collect();
        if let Some(expected) = config.expected_backends {
            if !routes.is_empty() && expected > backends.len() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Expecting load across {} backends but routes only name {}",
                        expected,
                        backends.len()
                    ),
                ));
            }
        }

        if routes.len() > backends.len() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Several entry points expect the same backend".to_string(),
            ));
        }

        Ok(warnings)
    }

    fn validate_load_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(concurrency) = config.concurrency {
            if concurrency > config.request_count as usize {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "Concurrency {} exceeds request count {}; extra workers stay idle",
                        concurrency, config.request_count
                    ),
                ));
            }
            if concurrency > 1000 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Concurrency {} opens that many sockets at once", concurrency),
                ));
            }
        }

        if config.timeout_ms < 10 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Timeout of {}ms is likely shorter than a real round-trip", config.timeout_ms),
            ));
        }

        warnings
    }

    fn validate_deadline(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(deadline) = config.run_deadline_ms {
            if deadline < config.timeout_ms {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Run deadline {}ms is shorter than a single request timeout {}ms",
                        deadline, config.timeout_ms
                    ),
                ));
            }
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }
        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
