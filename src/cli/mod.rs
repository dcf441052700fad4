//! Command-line interface definition

use crate::types::RunMode;
use clap::{ArgAction, Parser};

/// UDP Routing Harness - verifies that a UDP proxy routes datagrams to the
/// right backends and spreads load across them
#[derive(Parser, Debug, Clone)]
#[command(name = "urh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Which phases to run
    #[arg(short, long, value_enum)]
    pub mode: Option<RunMode>,

    /// Host of the load-test entry point (also the default host for --route)
    #[arg(long)]
    pub host: Option<String>,

    /// Port of the load-test entry point
    #[arg(short, long, value_parser = parse_port)]
    pub port: Option<u16>,

    /// Routing expectation as [HOST:]PORT=BACKEND (can be used multiple times)
    #[arg(short, long = "route", value_name = "[HOST:]PORT=BACKEND", action = ArgAction::Append)]
    pub routes: Vec<String>,

    /// Number of requests in the load phase
    #[arg(short = 'n', long, value_parser = parse_positive_u32)]
    pub requests: Option<u32>,

    /// Maximum probes in flight during the load phase
    #[arg(short, long, value_parser = parse_positive_usize)]
    pub concurrency: Option<usize>,

    /// Simulated clients in the clients phase
    #[arg(long, value_parser = parse_positive_u32)]
    pub clients: Option<u32>,

    /// Requests sent by each simulated client
    #[arg(long, value_parser = parse_positive_u32)]
    pub requests_per_client: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(short, long, value_parser = parse_timeout_ms)]
    pub timeout_ms: Option<u64>,

    /// Abort a whole load run after this many milliseconds
    #[arg(long, value_parser = parse_positive_u64)]
    pub run_deadline_ms: Option<u64>,

    /// Backends the load should spread across (defaults to the distinct route backends)
    #[arg(long, value_parser = parse_positive_usize)]
    pub expected_backends: Option<usize>,

    /// Largest share of attributed traffic a single backend may take (0, 1]
    #[arg(long, value_parser = parse_threshold)]
    pub dominance_threshold: Option<f64>,

    /// Phrase that precedes the backend id in replies
    #[arg(long)]
    pub marker: Option<String>,

    /// Payload sent by routing verification probes
    #[arg(long)]
    pub probe_message: Option<String>,

    /// Connect probe sockets so ICMP unreachable errors surface; replies
    /// from any other source address are then dropped by the kernel
    #[arg(long)]
    pub connect_sockets: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(marker) = &self.marker {
            if marker.trim().is_empty() {
                return Err("--marker cannot be empty".to_string());
            }
        }

        if let Some(message) = &self.probe_message {
            if message.is_empty() {
                return Err("--probe-message cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    match s.parse::<u16>() {
        Ok(0) => Err("Port must be greater than 0".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!("Invalid port: {}", s)),
    }
}

fn parse_positive_u32(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid number: {}", s)),
    }
}

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid number: {}", s)),
    }
}

fn parse_positive_usize(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid number: {}", s)),
    }
}

/// Parse a timeout in milliseconds
fn parse_timeout_ms(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|ms| {
            if ms == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if ms > crate::defaults::MAX_TIMEOUT_MS {
                Err(format!("Timeout cannot exceed {}ms", crate::defaults::MAX_TIMEOUT_MS))
            } else {
                Ok(ms)
            }
        })
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid threshold: {}", s))?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("Threshold must be in (0, 1], got {}", s))
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}
