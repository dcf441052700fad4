//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};
use std::path::PathBuf;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read defaults from a different env file instead of `./.env`
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(mode) = cli.mode {
            config.mode = mode;
        }
        if let Some(host) = &cli.host {
            config.target_host = host.trim().to_string();
        }
        if let Some(port) = cli.port {
            config.target_port = port;
        }
        if !cli.routes.is_empty() {
            config.routes = cli.routes.clone();
        }
        if let Some(requests) = cli.requests {
            config.request_count = requests;
        }
        if let Some(concurrency) = cli.concurrency {
            config.concurrency = Some(concurrency);
        }
        if let Some(clients) = cli.clients {
            config.clients = clients;
        }
        if let Some(per_client) = cli.requests_per_client {
            config.requests_per_client = per_client;
        }
        if let Some(timeout) = cli.timeout_ms {
            config.timeout_ms = timeout;
        }
        if let Some(deadline) = cli.run_deadline_ms {
            config.run_deadline_ms = Some(deadline);
        }
        if let Some(expected) = cli.expected_backends {
            config.expected_backends = Some(expected);
        }
        if let Some(threshold) = cli.dominance_threshold {
            config.dominance_threshold = threshold;
        }
        if let Some(marker) = &cli.marker {
            config.backend_marker = marker.clone();
        }
        if let Some(message) = &cli.probe_message {
            config.probe_message = message.clone();
        }
        if cli.connect_sockets {
            config.connect_sockets = true;
        }

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color {
            config.enable_color = false;
        }

        config.verbose = config.verbose || cli.verbose;
        config.debug = config.debug || cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Mode: {}", config.mode));
    summary.push(format!("Target: {}:{}", config.target_host, config.target_port));
    if config.routes.is_empty() {
        summary.push("Routes: none".to_string());
    } else {
        summary.push(format!("Routes: {}", config.routes.join(", ")));
    }
    summary.push(format!("Requests: {}", config.request_count));
    summary.push(format!(
        "Concurrency: {}",
        config
            .concurrency
            .map(|c| c.to_string())
            .unwrap_or_else(|| "auto".to_string())
    ));
    summary.push(format!(
        "Clients: {} x {} requests",
        config.clients, config.requests_per_client
    ));
    summary.push(format!("Timeout: {}ms", config.timeout_ms));
    if let Some(deadline) = config.run_deadline_ms {
        summary.push(format!("Run deadline: {}ms", deadline));
    }
    summary.push(format!("Dominance threshold: {}", config.dominance_threshold));
    summary.push(format!("Backend marker: '{}'", config.backend_marker));
    summary.push(format!("Connected probe sockets: {}", config.connect_sockets));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
