//! Data models and structures for the routing harness

pub mod config;
pub mod endpoint;
pub mod outcome;
pub mod run;

// Re-export main model types
pub use config::Config;
pub use endpoint::{Endpoint, RouteExpectation};
pub use outcome::{AttributedOutcome, ProbeOutcome, ProbeRequest, RoutingAssertion};
pub use run::{LatencySummary, LoadRunResult};

/// Serializes a `Duration` as fractional milliseconds in reports
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration: {}ms", ms)));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}
