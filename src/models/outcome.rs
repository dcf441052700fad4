//! Per-probe value records

use crate::models::{duration_ms, Endpoint};
use crate::types::{LatencyClass, OutcomeKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One logical request: the datagram to send and how long to wait for a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub payload: Vec<u8>,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn new<P: Into<Vec<u8>>>(payload: P, timeout: Duration) -> Self {
        Self {
            payload: payload.into(),
            timeout,
        }
    }
}

/// Result of a single request/reply exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// A reply arrived before the deadline
    Success {
        #[serde(with = "payload_text")]
        payload: Vec<u8>,
        #[serde(rename = "latency_ms", with = "duration_ms")]
        latency: Duration,
    },
    /// The deadline elapsed without a reply
    Timeout {
        #[serde(rename = "waited_ms", with = "duration_ms")]
        waited: Duration,
    },
    /// Local socket failure, resolution failure or synchronous unreachable
    TransportError { detail: String },
}

impl ProbeOutcome {
    pub fn success(payload: Vec<u8>, latency: Duration) -> Self {
        Self::Success { payload, latency }
    }

    pub fn timeout(waited: Duration) -> Self {
        Self::Timeout { waited }
    }

    pub fn transport_error<S: Into<String>>(detail: S) -> Self {
        Self::TransportError {
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::Timeout { .. } => OutcomeKind::Timeout,
            Self::TransportError { .. } => OutcomeKind::TransportError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Reply bytes, only present on success
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Round-trip latency, only present on success
    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Success { latency, .. } => Some(*latency),
            _ => None,
        }
    }

    pub fn latency_class(&self) -> Option<LatencyClass> {
        self.latency().map(LatencyClass::from_duration)
    }
}

/// A probe outcome together with the backend that produced the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedOutcome {
    pub outcome: ProbeOutcome,
    pub backend_id: Option<String>,
}

impl AttributedOutcome {
    /// Pair an outcome with its attribution.
    ///
    /// A backend can only be recorded for a successful outcome; for timeouts and
    /// transport errors the id is dropped.
    pub fn new(outcome: ProbeOutcome, backend_id: Option<String>) -> Self {
        let backend_id = if outcome.is_success() { backend_id } else { None };
        Self { outcome, backend_id }
    }

    pub fn is_attributed(&self) -> bool {
        self.backend_id.is_some()
    }
}

/// The verdict for one entry of the routing mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingAssertion {
    pub endpoint: Endpoint,
    pub expected_backend: String,
    pub actual: AttributedOutcome,
    pub passed: bool,
}

impl RoutingAssertion {
    /// Evaluate an attributed reply against the expected backend.
    ///
    /// Passing requires an exact match; an unattributable success fails.
    pub fn evaluate(endpoint: Endpoint, expected_backend: String, actual: AttributedOutcome) -> Self {
        let passed = actual.backend_id.as_deref() == Some(expected_backend.as_str());
        Self {
            endpoint,
            expected_backend,
            actual,
            passed,
        }
    }

    /// Short reason for a failed assertion, `None` when it passed
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        Some(match (&self.actual.outcome, &self.actual.backend_id) {
            (ProbeOutcome::Timeout { waited }, _) => {
                format!("no reply within {}ms", waited.as_millis())
            }
            (ProbeOutcome::TransportError { detail }, _) => format!("transport error: {}", detail),
            (ProbeOutcome::Success { .. }, Some(actual)) => {
                format!("routed to {} instead of {}", actual, self.expected_backend)
            }
            (ProbeOutcome::Success { .. }, None) => "reply carried no backend tag".to_string(),
        })
    }
}

/// Payload bytes appear as (lossy) text in reports
mod payload_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("localhost", 10001).unwrap()
    }

    #[test]
    fn test_outcome_accessors() {
        let success = ProbeOutcome::success(b"PONG".to_vec(), Duration::from_millis(4));
        assert_eq!(success.kind(), OutcomeKind::Success);
        assert_eq!(success.payload(), Some(&b"PONG"[..]));
        assert_eq!(success.latency(), Some(Duration::from_millis(4)));

        let timeout = ProbeOutcome::timeout(Duration::from_millis(100));
        assert_eq!(timeout.kind(), OutcomeKind::Timeout);
        assert!(timeout.payload().is_none());
        assert!(timeout.latency().is_none());

        let error = ProbeOutcome::transport_error("connection refused");
        assert_eq!(error.kind(), OutcomeKind::TransportError);
        assert!(error.payload().is_none());
    }

    #[test]
    fn test_backend_dropped_for_failed_outcome() {
        let attributed = AttributedOutcome::new(
            ProbeOutcome::timeout(Duration::from_millis(100)),
            Some("game-server-1".to_string()),
        );
        assert!(attributed.backend_id.is_none());
    }

    #[test]
    fn test_assertion_passes_on_exact_match() {
        let actual = AttributedOutcome::new(
            ProbeOutcome::success(b"PONG from server game-server-2".to_vec(), Duration::from_millis(2)),
            Some("game-server-2".to_string()),
        );
        let assertion = RoutingAssertion::evaluate(endpoint(), "game-server-2".to_string(), actual);
        assert!(assertion.passed);
        assert!(assertion.failure_reason().is_none());
    }

    #[test]
    fn test_assertion_fails_on_wrong_backend() {
        let actual = AttributedOutcome::new(
            ProbeOutcome::success(b"PONG from server game-server-1".to_vec(), Duration::from_millis(2)),
            Some("game-server-1".to_string()),
        );
        let assertion = RoutingAssertion::evaluate(endpoint(), "game-server-2".to_string(), actual);
        assert!(!assertion.passed);
        assert_eq!(
            assertion.failure_reason().unwrap(),
            "routed to game-server-1 instead of game-server-2"
        );
    }

    #[test]
    fn test_assertion_rejects_prefix_match() {
        let actual = AttributedOutcome::new(
            ProbeOutcome::success(b"PONG from server game-server-10".to_vec(), Duration::from_millis(2)),
            Some("game-server-10".to_string()),
        );
        let assertion = RoutingAssertion::evaluate(endpoint(), "game-server-1".to_string(), actual);
        assert!(!assertion.passed);
    }

    #[test]
    fn test_unattributed_success_fails() {
        let actual = AttributedOutcome::new(
            ProbeOutcome::success(b"PONG".to_vec(), Duration::from_millis(2)),
            None,
        );
        let assertion = RoutingAssertion::evaluate(endpoint(), "game-server-2".to_string(), actual);
        assert!(!assertion.passed);
        assert_eq!(assertion.failure_reason().unwrap(), "reply carried no backend tag");
    }

    #[test]
    fn test_outcome_serializes_with_kind_tag() {
        let outcome = ProbeOutcome::success(b"PONG".to_vec(), Duration::from_millis(5));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "success");
        assert_eq!(json["payload"], "PONG");
        assert_eq!(json["latency_ms"], 5.0);
    }
}
