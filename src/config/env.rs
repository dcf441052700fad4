//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::RouteExpectation;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists.
    ///
    /// Variables already present in the process environment are not replaced,
    /// so real environment variables take precedence over the file.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# UDP Routing Harness Configuration
#
# Values here are defaults; environment variables and command-line
# arguments override them.

# Load-test entry point
# HARNESS_HOST=localhost
# HARNESS_PORT=10000

# Routing expectations, comma-separated [host:]port=backend
# HARNESS_ROUTES=10000=game-server-1,10001=game-server-2,10002=game-server-3

# Load phase
# HARNESS_REQUESTS=100
# HARNESS_CONCURRENCY=10

# Client simulation phase
# HARNESS_CLIENTS=5
# HARNESS_REQUESTS_PER_CLIENT=20

# Per-request timeout and optional bound on a whole load run (milliseconds)
# HARNESS_TIMEOUT_MS=5000
# HARNESS_RUN_DEADLINE_MS=60000

# Distribution analysis
# HARNESS_EXPECTED_BACKENDS=3
# HARNESS_DOMINANCE_THRESHOLD=0.8

# Reply convention and probe payload
# HARNESS_BACKEND_MARKER=from server
# HARNESS_PROBE_MESSAGE=PING

# Connect probe sockets so ICMP unreachable errors are reported (true/false)
# HARNESS_CONNECT_SOCKETS=false

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;
        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "HARNESS_HOST" => {
                if value.is_empty() {
                    return Err(AppError::config("HARNESS_HOST cannot be empty"));
                }
            }
            "HARNESS_PORT" => {
                let port: u16 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid HARNESS_PORT value '{}': {}", value, e)))?;
                if port == 0 {
                    return Err(AppError::config("HARNESS_PORT must be greater than 0"));
                }
            }
            "HARNESS_ROUTES" => {
                for route in value.split(',').map(str::trim).filter(|r| !r.is_empty()) {
                    RouteExpectation::parse(route, crate::defaults::DEFAULT_HOST)
                        .map_err(|e| AppError::config(format!("Invalid HARNESS_ROUTES entry '{}': {}", route, e)))?;
                }
            }
            "HARNESS_REQUESTS" | "HARNESS_CONCURRENCY" | "HARNESS_CLIENTS" | "HARNESS_REQUESTS_PER_CLIENT"
            | "HARNESS_RUN_DEADLINE_MS" | "HARNESS_EXPECTED_BACKENDS" => {
                let n: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if n == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "HARNESS_TIMEOUT_MS" => {
                let timeout: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid HARNESS_TIMEOUT_MS value '{}': {}", value, e)))?;
                if timeout == 0 || timeout > crate::defaults::MAX_TIMEOUT_MS {
                    return Err(AppError::config(format!(
                        "HARNESS_TIMEOUT_MS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_TIMEOUT_MS,
                        timeout
                    )));
                }
            }
            "HARNESS_DOMINANCE_THRESHOLD" => {
                let threshold: f64 = value.parse().map_err(|e| {
                    AppError::config(format!("Invalid HARNESS_DOMINANCE_THRESHOLD value '{}': {}", value, e))
                })?;
                if !(threshold > 0.0 && threshold <= 1.0) {
                    return Err(AppError::config(format!(
                        "HARNESS_DOMINANCE_THRESHOLD must be in (0, 1], got: {}",
                        threshold
                    )));
                }
            }
            "HARNESS_BACKEND_MARKER" | "HARNESS_PROBE_MESSAGE" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "HARNESS_CONNECT_SOCKETS" | "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("HARNESS_HOST", "Host of the load-test entry point", "localhost"),
            ("HARNESS_PORT", "Port of the load-test entry point", "10000"),
            ("HARNESS_ROUTES", "Comma-separated [host:]port=backend entries", "10000=game-server-1"),
            ("HARNESS_REQUESTS", "Requests in the load phase", "100"),
            ("HARNESS_CONCURRENCY", "Maximum probes in flight", "10"),
            ("HARNESS_CLIENTS", "Simulated clients", "5"),
            ("HARNESS_REQUESTS_PER_CLIENT", "Requests per simulated client", "20"),
            ("HARNESS_TIMEOUT_MS", "Per-request timeout in milliseconds", "5000"),
            ("HARNESS_RUN_DEADLINE_MS", "Bound on a whole load run in milliseconds", "60000"),
            ("HARNESS_EXPECTED_BACKENDS", "Backends load should spread across", "3"),
            ("HARNESS_DOMINANCE_THRESHOLD", "Largest share one backend may take", "0.8"),
            ("HARNESS_BACKEND_MARKER", "Phrase preceding the backend id in replies", "from server"),
            ("HARNESS_PROBE_MESSAGE", "Payload of routing verification probes", "PING"),
            ("HARNESS_CONNECT_SOCKETS", "Connect probe sockets to surface ICMP errors", "false"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<28} {}\n", var, description));
            help.push_str(&format!("  {:<28} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Check an env file and return one warning per invalid line, `None` if absent
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();
        for (var, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", var)), "missing {}", var);
        }
    }

    #[test]
    fn test_save_example_file() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("UDP Routing Harness Configuration"));
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("HARNESS_PORT", "10000").is_ok());
        assert!(EnvManager::validate_env_var("HARNESS_ROUTES", "10000=gs-1, edge:10001=gs-2").is_ok());
        assert!(EnvManager::validate_env_var("HARNESS_TIMEOUT_MS", "250").is_ok());
        assert!(EnvManager::validate_env_var("HARNESS_DOMINANCE_THRESHOLD", "0.5").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("SOMETHING_ELSE", "whatever").is_ok());

        assert!(EnvManager::validate_env_var("HARNESS_PORT", "0").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_PORT", "70000").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_ROUTES", "10000").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_CONCURRENCY", "0").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_TIMEOUT_MS", "300001").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_DOMINANCE_THRESHOLD", "1.2").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_BACKEND_MARKER", "  ").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
        assert!(EnvManager::validate_env_var("HARNESS_CONNECT_SOCKETS", "true").is_ok());
        assert!(EnvManager::validate_env_var("HARNESS_CONNECT_SOCKETS", "yes").is_err());
    }

    #[test]
    fn test_check_env_file_reports_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "HARNESS_PORT=10001").unwrap();
        writeln!(file, "HARNESS_CONCURRENCY=zero").unwrap();
        file.flush().unwrap();

        let warnings = EnvManager::check_env_file(file.path()).unwrap().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("HARNESS_CONCURRENCY"));
    }

    #[test]
    fn test_missing_env_file() {
        let path = Path::new("/nonexistent/definitely/not/here.env");
        assert!(EnvManager::check_env_file(path).unwrap().is_none());
        assert!(EnvManager::load_env_file_from(path, false).is_ok());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();
        assert!(help.contains("HARNESS_ROUTES"));
        assert!(help.contains("Configuration Priority"));
    }
}
