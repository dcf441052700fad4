//! UDP Routing Harness
//!
//! A concurrent probe-and-verify harness for UDP routing layers that front a
//! pool of stateful game servers. It checks that each entry point lands on the
//! expected backend and measures how load spreads across backends.

pub mod app;
pub mod attribution;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod probe;
pub mod smoke;
pub mod stats;
pub mod types;
pub mod verifier;

// Re-export commonly used types
pub use app::{App, HarnessReport};
pub use attribution::Attributor;
pub use error::{AppError, Result};
pub use executor::{LoadDriver, RequestPlan};
pub use models::{
    AttributedOutcome, Config, Endpoint, LoadRunResult, ProbeOutcome, ProbeRequest,
    RouteExpectation, RoutingAssertion,
};
pub use probe::{Prober, UdpProber};
pub use stats::{DistributionAnalyzer, DistributionReport};
pub use smoke::{SmokeChecker, SmokeReport};
pub use verifier::{RoutingSummary, RoutingVerifier};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_HOST: &str = "localhost";
    pub const DEFAULT_PORT: u16 = 10000;
    pub const DEFAULT_REQUEST_COUNT: u32 = 100;
    pub const DEFAULT_CLIENTS: u32 = 5;
    pub const DEFAULT_REQUESTS_PER_CLIENT: u32 = 20;
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
    pub const MAX_TIMEOUT_MS: u64 = 300_000;
    /// Upper bound on probes in flight; each one holds a socket
    pub const MAX_CONCURRENCY: usize = 10_000;
    pub const DEFAULT_DOMINANCE_THRESHOLD: f64 = 0.8;
    /// Replies look like `PONG from server game-server-1 at 2024-01-01 10:00:00`
    pub const DEFAULT_BACKEND_MARKER: &str = "from server";
    pub const DEFAULT_PROBE_MESSAGE: &str = "PING";
    pub const DEFAULT_LOAD_PREFIX: &str = "PING";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    /// Largest payload a single UDP datagram can carry over IPv4
    pub const MAX_DATAGRAM_SIZE: usize = 65_507;
}
