//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Kind of a single probe outcome, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// A reply arrived before the deadline
    Success,
    /// No reply before the deadline
    Timeout,
    /// The socket failed locally or the destination was reported unreachable
    TransportError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which harness phases a single invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Smoke checks, routing verification, load run and client simulation
    #[default]
    All,
    /// Command/reply-prefix checks only
    Smoke,
    /// Routing verification against the route mapping only
    Verify,
    /// N independent requests to the target endpoint
    Load,
    /// K requests from each of C concurrent logical clients
    Clients,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Smoke => "smoke",
            Self::Verify => "verify",
            Self::Load => "load",
            Self::Clients => "clients",
        }
    }

    pub fn runs_smoke(&self) -> bool {
        matches!(self, Self::All | Self::Smoke)
    }

    pub fn runs_verify(&self) -> bool {
        matches!(self, Self::All | Self::Verify)
    }

    pub fn runs_load(&self) -> bool {
        matches!(self, Self::All | Self::Load)
    }

    pub fn runs_clients(&self) -> bool {
        matches!(self, Self::All | Self::Clients)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency classification for a round-trip on a local game network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    /// Under 50 ms
    Good,
    /// 50 ms to 200 ms
    Moderate,
    /// Over 200 ms
    Poor,
}

impl LatencyClass {
    /// Classify a round-trip latency
    pub fn from_duration(latency: Duration) -> Self {
        let ms = latency.as_secs_f64() * 1000.0;
        if ms < 50.0 {
            Self::Good
        } else if ms < 200.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}
