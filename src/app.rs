//! Main application orchestration and execution

use crate::{
    attribution::Attributor,
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, ValidationLevel},
    error::{AppError, Result},
    executor::{LoadDriver, RequestPlan, SystemResources},
    logging::{ProbeLogger, RunLogger},
    models::{Config, Endpoint, LoadRunResult, ProbeRequest, RoutingAssertion},
    probe::{Prober, UdpProber},
    smoke::{SmokeChecker, SmokeReport},
    stats::{DistributionAnalyzer, DistributionReport},
    types::RunMode,
    verifier::{RoutingSummary, RoutingVerifier},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Below this success rate a load phase counts as failed
const MIN_SUCCESS_RATE: f64 = 50.0;

/// Routing verification results
#[derive(Debug, Clone, Serialize)]
pub struct RoutingPhase {
    pub summary: RoutingSummary,
    pub assertions: Vec<RoutingAssertion>,
    /// The full command set sent to every routed entry point
    pub command_checks: Vec<SmokeReport>,
}

impl RoutingPhase {
    /// Entry points where at least one command missed its prefix or backend
    pub fn misrouted_commands(&self) -> usize {
        self.command_checks.iter().filter(|report| !report.all_passed()).count()
    }
}

/// One load run and the analysis of its backend spread
#[derive(Debug, Clone, Serialize)]
pub struct LoadPhase {
    pub concurrency: usize,
    pub success_rate: f64,
    pub throughput: f64,
    pub avg_time_per_request_ms: f64,
    pub result: LoadRunResult,
    pub distribution: DistributionReport,
}

impl LoadPhase {
    fn new(concurrency: usize, result: LoadRunResult, distribution: DistributionReport) -> Self {
        Self {
            concurrency,
            success_rate: result.success_rate(),
            throughput: result.throughput(),
            avg_time_per_request_ms: result.avg_time_per_request_ms(),
            result,
            distribution,
        }
    }
}

/// A phase that ended with an error instead of a result
#[derive(Debug, Clone, Serialize)]
pub struct PhaseError {
    pub phase: String,
    pub category: String,
    pub message: String,
    #[serde(skip)]
    error: AppError,
}

/// Everything one invocation found, ready for an external reporting layer
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub tool: String,
    pub version: String,
    /// Also stamped on every log entry of this invocation
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: RunMode,
    pub target: Endpoint,
    pub smoke: Option<SmokeReport>,
    pub routing: Option<RoutingPhase>,
    pub load: Option<LoadPhase>,
    pub clients: Option<LoadPhase>,
    pub skipped: Vec<String>,
    pub errors: Vec<PhaseError>,
    pub passed: bool,
}

impl HarnessReport {
    fn new(mode: RunMode, target: Endpoint) -> Self {
        let now = Utc::now();
        Self {
            tool: crate::PKG_NAME.to_string(),
            version: crate::VERSION.to_string(),
            session_id: Uuid::new_v4().to_string(),
            started_at: now,
            finished_at: now,
            mode,
            target,
            smoke: None,
            routing: None,
            load: None,
            clients: None,
            skipped: Vec::new(),
            errors: Vec::new(),
            passed: false,
        }
    }

    fn record_error(&mut self, phase: &str, error: AppError) {
        self.errors.push(PhaseError {
            phase: phase.to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
            error,
        });
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.passed = self.verdict().is_ok();
        self
    }

    /// Collapse the report into a single pass/fail.
    ///
    /// A phase error wins over verification failures so the exit code reflects
    /// it (a run deadline exits as a timeout, for example).
    pub fn verdict(&self) -> Result<()> {
        if let Some(first) = self.errors.first() {
            return Err(first.error.clone());
        }

        let mut failures = Vec::new();

        if let Some(smoke) = &self.smoke {
            if !smoke.all_passed() {
                failures.push(format!(
                    "smoke checks: {} of {} passed",
                    smoke.passed_count(),
                    smoke.results.len()
                ));
            }
        }

        if let Some(routing) = &self.routing {
            if !routing.summary.all_passed() {
                failures.push(format!(
                    "routing: {} of {} entry points misrouted",
                    routing.summary.total - routing.summary.passed,
                    routing.summary.total
                ));
            }
            let misrouted = routing.misrouted_commands();
            if misrouted > 0 {
                failures.push(format!(
                    "routing: {} of {} entry points failed command checks",
                    misrouted,
                    routing.command_checks.len()
                ));
            }
        }

        for (name, phase) in [("load", &self.load), ("clients", &self.clients)] {
            let Some(phase) = phase else { continue };
            if phase.success_rate < MIN_SUCCESS_RATE {
                failures.push(format!("{}: only {:.1}% of requests succeeded", name, phase.success_rate));
            }
            if let Some(detail) = &phase.distribution.skew_detail {
                failures.push(format!("{}: unbalanced distribution ({})", name, detail));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::verification(failures.join("; ")))
        }
    }
}

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    prober: Arc<dyn Prober>,
}

impl App {
    /// Create a new application instance from CLI arguments
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        let config = load_config(cli)?;

        let warnings = validate_config(&config)?;
        for warning in &warnings {
            if warning.level == ValidationLevel::Warning || config.verbose {
                eprintln!("{}", warning.format(config.enable_color));
            }
        }
        if config.debug {
            eprintln!("{} v{} ({}, built {})", crate::PKG_NAME, crate::VERSION, crate::GIT_COMMIT, crate::BUILD_TIME);
            eprintln!("{}", display_config_summary(&config));
        }

        Ok(Self::from_config(config))
    }

    /// Build an application around an already validated configuration
    pub fn from_config(config: Config) -> Self {
        let prober = UdpProber::new().with_connected_socket(config.connect_sockets);
        Self {
            config,
            prober: Arc::new(prober),
        }
    }

    /// Replace the transport, mainly for tests
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every phase the mode selects and collect the results.
    ///
    /// Only an invalid configuration is returned as an error; phase failures
    /// are recorded in the report.
    pub async fn run(&self) -> Result<HarnessReport> {
        let config = &self.config;
        config.validate()?;

        let target = config.target_endpoint()?;
        let routes = config.route_expectations()?;
        let expected_backends = config.expected_backend_count()?;
        let analyzer = DistributionAnalyzer::new(config.dominance_threshold)?;
        let attributor = Arc::new(Attributor::new(&config.backend_marker)?);
        let concurrency = config
            .concurrency
            .unwrap_or_else(|| SystemResources::detect().optimal_concurrency);

        let probe_logger = ProbeLogger::from_config(config);
        let run_logger = RunLogger::from_config(config);
        let mut report = HarnessReport::new(config.mode, target.clone());
        probe_logger.attach_session(&report.session_id, config.mode).await;
        run_logger.attach_session(&report.session_id, config.mode).await;

        let smoke_checker = SmokeChecker::new(Arc::clone(&self.prober), Arc::clone(&attributor), config.timeout())
            .with_logger(probe_logger.clone());

        if config.mode.runs_smoke() {
            let smoke = smoke_checker.run(&target).await;
            let passed = smoke.all_passed();
            run_logger
                .phase(
                    "smoke",
                    &format!("{}/{} smoke checks passed against {}", smoke.passed_count(), smoke.results.len(), target),
                    passed,
                )
                .await;
            report.smoke = Some(smoke);

            if !passed && config.mode == RunMode::All {
                report.skipped.push("verify, load and clients phases skipped after failed smoke checks".to_string());
                return Ok(report.finish());
            }
        }

        if config.mode.runs_verify() {
            if routes.is_empty() {
                report.skipped.push("verify: no routes configured".to_string());
            } else {
                let verifier = RoutingVerifier::new(
                    Arc::clone(&self.prober),
                    Arc::clone(&attributor),
                    config.probe_message.as_str(),
                    config.timeout(),
                )
                .with_logger(probe_logger.clone());

                match verifier.verify(&routes).await {
                    Ok(assertions) => {
                        let summary = RoutingSummary::from_assertions(&assertions);
                        let command_checks = smoke_checker.run_routes(&routes).await;
                        let routing = RoutingPhase {
                            summary,
                            assertions,
                            command_checks,
                        };
                        let misrouted = routing.misrouted_commands();
                        run_logger
                            .phase(
                                "verify",
                                &format!(
                                    "{}/{} entry points routed as expected, {} with misrouted commands",
                                    routing.summary.passed, routing.summary.total, misrouted
                                ),
                                routing.summary.all_passed() && misrouted == 0,
                            )
                            .await;
                        report.routing = Some(routing);
                    }
                    Err(e) => {
                        run_logger.log_error(&e, "Routing verification failed").await;
                        report.record_error("verify", e);
                    }
                }
            }
        }

        let driver = LoadDriver::new(Arc::clone(&self.prober), Arc::clone(&attributor))
            .with_run_deadline(config.run_deadline())
            .with_loggers(probe_logger, run_logger.clone());

        if config.mode.runs_load() {
            let requests = RequestPlan::independent(config.request_count as usize, &config.load_prefix, config.timeout());
            match self
                .load_phase(&driver, &analyzer, &target, requests, concurrency, expected_backends)
                .await
            {
                Ok(phase) => report.load = Some(phase),
                Err(e) => {
                    run_logger.log_error(&e, "Load phase failed").await;
                    report.record_error("load", e);
                }
            }
        }

        if config.mode.runs_clients() {
            let clients = config.clients as usize;
            let requests = RequestPlan::per_client(clients, config.requests_per_client as usize, config.timeout());
            match self
                .load_phase(&driver, &analyzer, &target, requests, clients, expected_backends)
                .await
            {
                Ok(phase) => report.clients = Some(phase),
                Err(e) => {
                    run_logger.log_error(&e, "Client simulation failed").await;
                    report.record_error("clients", e);
                }
            }
        }

        Ok(report.finish())
    }

    async fn load_phase(
        &self,
        driver: &LoadDriver,
        analyzer: &DistributionAnalyzer,
        target: &Endpoint,
        requests: Vec<ProbeRequest>,
        concurrency: usize,
        expected_backends: usize,
    ) -> Result<LoadPhase> {
        let result = driver.run(target, requests, concurrency).await?;
        let distribution = analyzer.analyze(&result, expected_backends);
        Ok(LoadPhase::new(concurrency, result, distribution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Game-server stand-in: port 10000 rotates over three backends, 10001 and
    /// 10002 are pinned, anything else is silent
    struct FakeRouter {
        counter: AtomicUsize,
        answers_status: bool,
        status_leaks_from_10001: bool,
    }

    impl FakeRouter {
        fn new(answers_status: bool) -> Self {
            Self {
                counter: AtomicUsize::new(0),
                answers_status,
                status_leaks_from_10001: false,
            }
        }

        /// STATUS sent to 10001 is answered by game-server-3
        fn leaking_status(mut self) -> Self {
            self.status_leaks_from_10001 = true;
            self
        }
    }

    #[async_trait]
    impl Prober for FakeRouter {
        async fn probe(&self, endpoint: &Endpoint, request: &ProbeRequest) -> ProbeOutcome {
            let backend = match endpoint.port() {
                10000 => format!("game-server-{}", self.counter.fetch_add(1, Ordering::SeqCst) % 3 + 1),
                10001 if self.status_leaks_from_10001 && request.payload.starts_with(b"STATUS") => {
                    "game-server-3".to_string()
                }
                10001 => "game-server-2".to_string(),
                10002 => "game-server-3".to_string(),
                _ => return ProbeOutcome::timeout(request.timeout),
            };
            let text = String::from_utf8_lossy(&request.payload).to_string();
            let reply = if text.starts_with("BATTLE") {
                format!("BATTLE_RESPONSE from server {}: ok", backend)
            } else if text.starts_with("STATUS") {
                if !self.answers_status {
                    return ProbeOutcome::timeout(request.timeout);
                }
                format!("STATUS_RESPONSE from server {}: running", backend)
            } else {
                format!("PONG from server {} at 12:00", backend)
            };
            ProbeOutcome::success(reply.into_bytes(), Duration::from_millis(1))
        }
    }

    fn config(mode: RunMode, routes: &[&str]) -> Config {
        Config {
            mode,
            routes: routes.iter().map(|r| r.to_string()).collect(),
            request_count: 30,
            concurrency: Some(4),
            clients: 3,
            requests_per_client: 4,
            timeout_ms: 50,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_all_phases_pass() {
        let app = App::from_config(config(
            RunMode::All,
            &["10000=game-server-1", "10001=game-server-2", "10002=game-server-3"],
        ))
        .with_prober(Arc::new(FakeRouter::new(true)));

        let report = app.run().await.unwrap();

        assert!(report.smoke.as_ref().unwrap().all_passed());
        // 10000 rotates, so only the pinned entries are certain to pass
        let routing = report.routing.as_ref().unwrap();
        assert_eq!(routing.assertions.len(), 3);
        assert!(routing.assertions[1].passed);
        assert!(routing.assertions[2].passed);

        let load = report.load.as_ref().unwrap();
        assert_eq!(load.result.total_requests, 30);
        assert!(load.distribution.is_balanced);
        assert_eq!(report.clients.as_ref().unwrap().result.total_requests, 12);
    }

    #[tokio::test]
    async fn test_failed_smoke_skips_later_phases() {
        let app = App::from_config(config(RunMode::All, &["10001=game-server-2"]))
            .with_prober(Arc::new(FakeRouter::new(false)));

        let report = app.run().await.unwrap();

        assert!(!report.passed);
        assert!(report.routing.is_none());
        assert!(report.load.is_none());
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.verdict(), Err(AppError::Verification(_))));
    }

    #[tokio::test]
    async fn test_misrouting_fails_verdict() {
        let app = App::from_config(config(RunMode::Verify, &["10001=game-server-2", "10002=game-server-2"]))
            .with_prober(Arc::new(FakeRouter::new(true)));

        let report = app.run().await.unwrap();

        assert!(report.smoke.is_none());
        assert!(report.load.is_none());
        let routing = report.routing.as_ref().unwrap();
        assert_eq!(routing.summary.passed, 1);
        match report.verdict() {
            Err(AppError::Verification(message)) => assert!(message.contains("1 of 2 entry points misrouted")),
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_misrouted_status_fails_verdict() {
        let app = App::from_config(config(RunMode::Verify, &["10001=game-server-2", "10002=game-server-3"]))
            .with_prober(Arc::new(FakeRouter::new(true).leaking_status()));

        let report = app.run().await.unwrap();

        let routing = report.routing.as_ref().unwrap();
        // The canonical PING is routed correctly on both ports
        assert!(routing.summary.all_passed());
        assert_eq!(routing.command_checks.len(), 2);
        assert_eq!(routing.misrouted_commands(), 1);
        assert!(!routing.command_checks[0].all_passed());
        assert!(routing.command_checks[1].all_passed());
        assert!(!report.passed);
        match report.verdict() {
            Err(AppError::Verification(message)) => {
                assert!(message.contains("1 of 2 entry points failed command checks"))
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pinned_load_is_unbalanced() {
        let mut config = config(RunMode::Load, &[]);
        config.target_port = 10001;
        config.expected_backends = Some(3);
        let app = App::from_config(config).with_prober(Arc::new(FakeRouter::new(true)));

        let report = app.run().await.unwrap();

        let load = report.load.as_ref().unwrap();
        assert!(!load.distribution.is_balanced);
        assert!(!report.passed);
    }

    #[tokio::test]
    async fn test_silent_target_fails_success_rate() {
        let mut config = config(RunMode::Clients, &[]);
        config.target_port = 19999;
        let app = App::from_config(config).with_prober(Arc::new(FakeRouter::new(true)));

        let report = app.run().await.unwrap();

        let clients = report.clients.as_ref().unwrap();
        assert_eq!(clients.result.timed_out, 12);
        assert_eq!(clients.concurrency, 3);
        assert!(report.verdict().unwrap_err().to_string().contains("only 0.0% of requests succeeded"));
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let app = App::from_config(config(RunMode::Load, &[])).with_prober(Arc::new(FakeRouter::new(true)));
        let report = app.run().await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "load");
        assert_eq!(json["target"]["port"], 10000);
        assert_eq!(json["load"]["result"]["total_requests"], 30);
        assert_eq!(json["session_id"].as_str().unwrap().len(), 36);
        assert!(json["smoke"].is_null());
    }
}
