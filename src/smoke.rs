//! Command/reply smoke checks
//!
//! Run against the load entry point before the load phases, and against every
//! routed entry point, where each command must also reach the expected backend.

use crate::{
    attribution::Attributor,
    executor::attributed_probe,
    logging::ProbeLogger,
    models::{AttributedOutcome, Endpoint, ProbeRequest, RouteExpectation},
    probe::Prober,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// A command and the prefix its reply must start with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeCheck {
    pub command: String,
    pub expected_prefix: String,
}

impl SmokeCheck {
    pub fn new(command: &str, expected_prefix: &str) -> Self {
        Self {
            command: command.to_string(),
            expected_prefix: expected_prefix.to_string(),
        }
    }

    /// The game-server command set: ping, battle and status
    pub fn game_server_defaults() -> Vec<Self> {
        vec![
            Self::new("PING", "PONG"),
            Self::new("BATTLE test", "BATTLE_RESPONSE"),
            Self::new("STATUS", "STATUS_RESPONSE"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeResult {
    #[serde(flatten)]
    pub check: SmokeCheck,
    pub actual: AttributedOutcome,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeReport {
    pub endpoint: Endpoint,
    /// Backend every reply must be attributed to, for routed entry points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_backend: Option<String>,
    pub results: Vec<SmokeResult>,
}

impl SmokeReport {
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|result| result.passed).count()
    }
}

/// Runs smoke checks one after another against a single endpoint
pub struct SmokeChecker {
    prober: Arc<dyn Prober>,
    attributor: Arc<Attributor>,
    checks: Vec<SmokeCheck>,
    timeout: Duration,
    logger: ProbeLogger,
}

impl SmokeChecker {
    pub fn new(prober: Arc<dyn Prober>, attributor: Arc<Attributor>, timeout: Duration) -> Self {
        Self {
            prober,
            attributor,
            checks: SmokeCheck::game_server_defaults(),
            timeout,
            logger: ProbeLogger::silent(),
        }
    }

    pub fn with_checks(mut self, checks: Vec<SmokeCheck>) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub async fn run(&self, endpoint: &Endpoint) -> SmokeReport {
        self.run_against(endpoint, None).await
    }

    /// Run the command set against every routed entry point.
    ///
    /// Entry points are checked concurrently; reports keep the mapping order.
    /// A check passes only when the reply has the expected prefix and is
    /// attributed to the entry's expected backend.
    pub async fn run_routes(&self, mapping: &[RouteExpectation]) -> Vec<SmokeReport> {
        join_all(
            mapping
                .iter()
                .map(|route| self.run_against(&route.endpoint, Some(route.expected_backend.as_str()))),
        )
        .await
    }

    async fn run_against(&self, endpoint: &Endpoint, expected_backend: Option<&str>) -> SmokeReport {
        let mut results = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let request = ProbeRequest::new(check.command.as_str(), self.timeout);
            let actual = attributed_probe(self.prober.as_ref(), &self.attributor, endpoint, &request).await;
            self.logger.log_outcome(endpoint, &actual, None).await;

            let prefix_matches = actual
                .outcome
                .payload()
                .map(|payload| payload.starts_with(check.expected_prefix.as_bytes()))
                .unwrap_or(false);
            let backend_matches = match expected_backend {
                Some(expected) => actual.backend_id.as_deref() == Some(expected),
                None => true,
            };

            results.push(SmokeResult {
                check: check.clone(),
                actual,
                passed: prefix_matches && backend_matches,
            });
        }

        SmokeReport {
            endpoint: endpoint.clone(),
            expected_backend: expected_backend.map(str::to_string),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeOutcome;
    use async_trait::async_trait;

    /// Mimics a game server, except that it ignores STATUS
    struct GameServer;

    #[async_trait]
    impl Prober for GameServer {
        async fn probe(&self, _endpoint: &Endpoint, request: &ProbeRequest) -> ProbeOutcome {
            let text = String::from_utf8_lossy(&request.payload).to_string();
            let reply = if text.starts_with("PING") {
                "PONG from server game-server-1 at 12:00".to_string()
            } else if text.starts_with("BATTLE") {
                format!("BATTLE_RESPONSE from server game-server-1: {}", text)
            } else {
                return ProbeOutcome::timeout(request.timeout);
            };
            ProbeOutcome::success(reply.into_bytes(), Duration::from_millis(1))
        }
    }

    /// Port 10001 is served by game-server-2, except that its STATUS
    /// traffic lands on game-server-3
    struct SplitRouter;

    #[async_trait]
    impl Prober for SplitRouter {
        async fn probe(&self, endpoint: &Endpoint, request: &ProbeRequest) -> ProbeOutcome {
            let text = String::from_utf8_lossy(&request.payload).to_string();
            let backend = match (endpoint.port(), text.starts_with("STATUS")) {
                (10001, true) => "game-server-3",
                (10001, false) => "game-server-2",
                _ => "game-server-1",
            };
            let reply = if text.starts_with("PING") {
                format!("PONG from server {} at 12:00", backend)
            } else if text.starts_with("BATTLE") {
                format!("BATTLE_RESPONSE from server {}: {}", backend, text)
            } else {
                format!("STATUS_RESPONSE from server {}: running", backend)
            };
            ProbeOutcome::success(reply.into_bytes(), Duration::from_millis(1))
        }
    }

    fn route(port: u16, backend: &str) -> RouteExpectation {
        RouteExpectation::new(Endpoint::new("localhost", port).unwrap(), backend).unwrap()
    }

    fn checker() -> SmokeChecker {
        SmokeChecker::new(
            Arc::new(GameServer),
            Arc::new(Attributor::new("from server").unwrap()),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_reports_each_check() {
        let endpoint = Endpoint::new("localhost", 10000).unwrap();
        let report = checker().run(&endpoint).await;

        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].passed);
        assert_eq!(report.results[0].actual.backend_id.as_deref(), Some("game-server-1"));
        assert!(report.results[1].passed);
        assert!(!report.results[2].passed);
        assert_eq!(report.passed_count(), 2);
        assert!(!report.all_passed());
    }

    #[tokio::test]
    async fn test_prefix_mismatch_fails() {
        let endpoint = Endpoint::new("localhost", 10000).unwrap();
        let report = checker()
            .with_checks(vec![SmokeCheck::new("PING", "PING")])
            .run(&endpoint)
            .await;
        assert!(!report.all_passed());
    }

    #[tokio::test]
    async fn test_route_commands_catch_partially_misrouted_port() {
        let checker = SmokeChecker::new(
            Arc::new(SplitRouter),
            Arc::new(Attributor::new("from server").unwrap()),
            Duration::from_millis(50),
        );

        let reports = checker
            .run_routes(&[route(10000, "game-server-1"), route(10001, "game-server-2")])
            .await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].all_passed());
        assert_eq!(reports[0].expected_backend.as_deref(), Some("game-server-1"));

        let split = &reports[1];
        assert_eq!(split.endpoint.port(), 10001);
        assert_eq!(split.passed_count(), 2);
        let status = &split.results[2];
        assert_eq!(status.check.command, "STATUS");
        assert!(!status.passed);
        assert_eq!(status.actual.backend_id.as_deref(), Some("game-server-3"));
    }

    #[tokio::test]
    async fn test_target_checks_ignore_backend_identity() {
        let checker = SmokeChecker::new(
            Arc::new(SplitRouter),
            Arc::new(Attributor::new("from server").unwrap()),
            Duration::from_millis(50),
        );
        let report = checker.run(&Endpoint::new("localhost", 10001).unwrap()).await;

        assert!(report.all_passed());
        assert!(report.expected_backend.is_none());
    }
}
