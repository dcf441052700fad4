//! Configuration data model and validation

use crate::models::{Endpoint, RouteExpectation};
use crate::types::{AppError, Result, RunMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Phases to run
    #[serde(default)]
    pub mode: RunMode,

    /// Host of the routing layer entry point used for load runs
    #[serde(default = "default_host")]
    pub target_host: String,

    /// Port of the routing layer entry point used for load runs
    #[serde(default = "default_port")]
    pub target_port: u16,

    /// Route specs in `[host:]port=backend` form
    #[serde(default)]
    pub routes: Vec<String>,

    /// Number of independent requests in a load run
    #[serde(default = "default_request_count")]
    pub request_count: u32,

    /// Worker count for load runs; detected from the CPU count when unset
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Logical clients in a client simulation
    #[serde(default = "default_clients")]
    pub clients: u32,

    /// Requests issued by each simulated client
    #[serde(default = "default_requests_per_client")]
    pub requests_per_client: u32,

    /// Per-request reply deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional bound on a whole load run in milliseconds
    #[serde(default)]
    pub run_deadline_ms: Option<u64>,

    /// Backends expected to share load; defaults to the distinct backends in `routes`
    #[serde(default)]
    pub expected_backends: Option<usize>,

    /// Largest share of attributed traffic a single backend may take
    #[serde(default = "default_dominance_threshold")]
    pub dominance_threshold: f64,

    /// Text that precedes the backend id in replies
    #[serde(default = "default_backend_marker")]
    pub backend_marker: String,

    /// Canonical message sent by the routing verifier
    #[serde(default = "default_probe_message")]
    pub probe_message: String,

    /// Prefix of load run payloads (`{prefix}_{i}`)
    #[serde(default = "default_load_prefix")]
    pub load_prefix: String,

    /// Connect probe sockets to the destination; replies must then come back
    /// from exactly the probed address
    #[serde(default)]
    pub connect_sockets: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            target_host: default_host(),
            target_port: default_port(),
            routes: Vec::new(),
            request_count: default_request_count(),
            concurrency: None,
            clients: default_clients(),
            requests_per_client: default_requests_per_client(),
            timeout_ms: default_timeout_ms(),
            run_deadline_ms: None,
            expected_backends: None,
            dominance_threshold: default_dominance_threshold(),
            backend_marker: default_backend_marker(),
            probe_message: default_probe_message(),
            load_prefix: default_load_prefix(),
            connect_sockets: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the per-request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the run deadline as Duration, if any
    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_ms.map(Duration::from_millis)
    }

    /// Load-run entry point
    pub fn target_endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(self.target_host.as_str(), self.target_port)
    }

    /// Parse the configured route specs into the routing mapping
    pub fn route_expectations(&self) -> Result<Vec<RouteExpectation>> {
        self.routes
            .iter()
            .map(|spec| RouteExpectation::parse(spec, &self.target_host))
            .collect()
    }

    /// Number of backends load is expected to spread across
    pub fn expected_backend_count(&self) -> Result<usize> {
        if let Some(count) = self.expected_backends {
            return Ok(count);
        }
        let distinct: HashSet<String> = self
            .route_expectations()?
            .into_iter()
            .map(|route| route.expected_backend)
            .collect();
        Ok(distinct.len().max(1))
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.target_host.trim().is_empty() {
            return Err(AppError::config("Target host cannot be empty"));
        }

        if self.target_port == 0 {
            return Err(AppError::config("Target port must be greater than 0"));
        }

        let routes = self
            .route_expectations()
            .map_err(|e| AppError::config(format!("Invalid route: {}", e)))?;
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.endpoint.clone()) {
                return Err(AppError::config(format!(
                    "Entry point {} appears in more than one route",
                    route.endpoint
                )));
            }
        }

        if self.mode.runs_verify() && self.mode != RunMode::All && routes.is_empty() {
            return Err(AppError::config("Verify mode needs at least one --route"));
        }

        if self.request_count == 0 {
            return Err(AppError::config("Request count must be greater than 0"));
        }

        if self.concurrency == Some(0) {
            return Err(AppError::config("Concurrency must be greater than 0"));
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency > crate::defaults::MAX_CONCURRENCY {
                return Err(AppError::config(format!(
                    "Concurrency cannot exceed {}, got {}",
                    crate::defaults::MAX_CONCURRENCY,
                    concurrency
                )));
            }
        }

        if self.clients == 0 {
            return Err(AppError::config("Client count must be greater than 0"));
        }

        if self.requests_per_client == 0 {
            return Err(AppError::config("Requests per client must be greater than 0"));
        }

        if self.timeout_ms == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_ms > crate::defaults::MAX_TIMEOUT_MS {
            return Err(AppError::config(format!(
                "Timeout cannot exceed {}ms",
                crate::defaults::MAX_TIMEOUT_MS
            )));
        }

        if self.run_deadline_ms == Some(0) {
            return Err(AppError::config("Run deadline must be greater than 0"));
        }

        if self.expected_backends == Some(0) {
            return Err(AppError::config("Expected backend count must be greater than 0"));
        }

        if !(self.dominance_threshold > 0.0 && self.dominance_threshold <= 1.0) {
            return Err(AppError::config(format!(
                "Dominance threshold must be in (0, 1], got {}",
                self.dominance_threshold
            )));
        }

        if self.backend_marker.trim().is_empty() {
            return Err(AppError::config("Backend marker cannot be empty"));
        }

        if self.probe_message.is_empty() {
            return Err(AppError::config("Probe message cannot be empty"));
        }

        if self.load_prefix.is_empty() {
            return Err(AppError::config("Load payload prefix cannot be empty"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HARNESS_HOST") {
            self.target_host = host.trim().to_string();
        }

        if let Ok(port) = std::env::var("HARNESS_PORT") {
            self.target_port = port
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid HARNESS_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(routes) = std::env::var("HARNESS_ROUTES") {
            self.routes = routes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(count) = std::env::var("HARNESS_REQUESTS") {
            self.request_count = count
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid HARNESS_REQUESTS value '{}': {}", count, e)))?;
        }

        if let Ok(concurrency) = std::env::var("HARNESS_CONCURRENCY") {
            self.concurrency = Some(concurrency.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_CONCURRENCY value '{}': {}", concurrency, e))
            })?);
        }

        if let Ok(clients) = std::env::var("HARNESS_CLIENTS") {
            self.clients = clients
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid HARNESS_CLIENTS value '{}': {}", clients, e)))?;
        }

        if let Ok(per_client) = std::env::var("HARNESS_REQUESTS_PER_CLIENT") {
            self.requests_per_client = per_client.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_REQUESTS_PER_CLIENT value '{}': {}", per_client, e))
            })?;
        }

        if let Ok(timeout) = std::env::var("HARNESS_TIMEOUT_MS") {
            self.timeout_ms = timeout
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid HARNESS_TIMEOUT_MS value '{}': {}", timeout, e)))?;
        }

        if let Ok(deadline) = std::env::var("HARNESS_RUN_DEADLINE_MS") {
            self.run_deadline_ms = Some(deadline.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_RUN_DEADLINE_MS value '{}': {}", deadline, e))
            })?);
        }

        if let Ok(expected) = std::env::var("HARNESS_EXPECTED_BACKENDS") {
            self.expected_backends = Some(expected.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_EXPECTED_BACKENDS value '{}': {}", expected, e))
            })?);
        }

        if let Ok(threshold) = std::env::var("HARNESS_DOMINANCE_THRESHOLD") {
            self.dominance_threshold = threshold.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_DOMINANCE_THRESHOLD value '{}': {}", threshold, e))
            })?;
        }

        if let Ok(marker) = std::env::var("HARNESS_BACKEND_MARKER") {
            self.backend_marker = marker;
        }

        if let Ok(message) = std::env::var("HARNESS_PROBE_MESSAGE") {
            self.probe_message = message;
        }

        if let Ok(connect) = std::env::var("HARNESS_CONNECT_SOCKETS") {
            self.connect_sockets = connect.trim().parse().map_err(|e| {
                AppError::config(format!("Invalid HARNESS_CONNECT_SOCKETS value '{}': {}", connect, e))
            })?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color
                .trim()
                .parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_host() -> String {
    crate::defaults::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    crate::defaults::DEFAULT_PORT
}

fn default_request_count() -> u32 {
    crate::defaults::DEFAULT_REQUEST_COUNT
}

fn default_clients() -> u32 {
    crate::defaults::DEFAULT_CLIENTS
}

fn default_requests_per_client() -> u32 {
    crate::defaults::DEFAULT_REQUESTS_PER_CLIENT
}

fn default_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT_MS
}

fn default_dominance_threshold() -> f64 {
    crate::defaults::DEFAULT_DOMINANCE_THRESHOLD
}

fn default_backend_marker() -> String {
    crate::defaults::DEFAULT_BACKEND_MARKER.to_string()
}

fn default_probe_message() -> String {
    crate::defaults::DEFAULT_PROBE_MESSAGE.to_string()
}

fn default_load_prefix() -> String {
    crate::defaults::DEFAULT_LOAD_PREFIX.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
