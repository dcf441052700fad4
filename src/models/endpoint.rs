//! Probe destinations and the static routing expectation mapping

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A UDP destination identified by host and port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create a new endpoint, rejecting an empty host or port 0
    pub fn new<S: Into<String>>(host: S, port: u16) -> Result<Self> {
        let host = host.into();
        // Bracketed IPv6 literals are stored bare
        let host = host.trim().trim_start_matches('[').trim_end_matches(']').trim();
        if host.is_empty() {
            return Err(AppError::validation("Endpoint host cannot be empty"));
        }
        if port == 0 {
            return Err(AppError::validation(format!("Endpoint {} has port 0", host)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address string suitable for `tokio::net::lookup_host`
    pub fn lookup_target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lookup_target())
    }
}

impl FromStr for Endpoint {
    type Err = AppError;

    /// Parse `host:port` or `[v6-addr]:port`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AppError::parse(format!("Endpoint '{}' must look like host:port", s)))?;
        let port: u16 = port
            .parse()
            .map_err(|e| AppError::parse(format!("Invalid port in endpoint '{}': {}", s, e)))?;
        Self::new(host, port)
    }
}

/// One entry of the routing mapping: probing `endpoint` must reach `expected_backend`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteExpectation {
    pub endpoint: Endpoint,
    pub expected_backend: String,
}

impl RouteExpectation {
    pub fn new<S: Into<String>>(endpoint: Endpoint, expected_backend: S) -> Result<Self> {
        let expected_backend = expected_backend.into().trim().to_string();
        if expected_backend.is_empty() {
            return Err(AppError::validation(format!(
                "Route {} has an empty expected backend",
                endpoint
            )));
        }
        Ok(Self {
            endpoint,
            expected_backend,
        })
    }

    /// Parse a route spec of the form `[host:]port=backend`.
    ///
    /// A bare port is resolved against `default_host`, so `10001=game-server-2`
    /// means "`default_host:10001` must be served by `game-server-2`".
    pub fn parse(spec: &str, default_host: &str) -> Result<Self> {
        let (target, backend) = spec
            .split_once('=')
            .ok_or_else(|| AppError::parse(format!("Route '{}' must look like [host:]port=backend", spec)))?;
        let target = target.trim();

        let endpoint = if let Ok(port) = target.parse::<u16>() {
            Endpoint::new(default_host, port)?
        } else {
            target.parse()?
        };

        Self::new(endpoint, backend)
    }
}

impl fmt::Display for RouteExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.endpoint, self.expected_backend)
    }
}
