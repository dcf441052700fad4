//! Static routing verification
//!
//! Each mapping entry gets one canonical probe; the attributed reply must name
//! exactly the expected backend.

use crate::{
    attribution::Attributor,
    error::{AppError, Result},
    executor::attributed_probe,
    logging::ProbeLogger,
    models::{Endpoint, ProbeRequest, RouteExpectation, RoutingAssertion},
    probe::Prober,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// Checks that each entry point is routed to its expected backend
pub struct RoutingVerifier {
    prober: Arc<dyn Prober>,
    attributor: Arc<Attributor>,
    probe_message: Vec<u8>,
    timeout: Duration,
    logger: ProbeLogger,
}

impl RoutingVerifier {
    pub fn new(
        prober: Arc<dyn Prober>,
        attributor: Arc<Attributor>,
        probe_message: impl Into<Vec<u8>>,
        timeout: Duration,
    ) -> Self {
        Self {
            prober,
            attributor,
            probe_message: probe_message.into(),
            timeout,
            logger: ProbeLogger::silent(),
        }
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Probe every entry and return one assertion per entry, in input order.
    ///
    /// Entries are probed concurrently and independently: a timeout or
    /// mismatch on one entry does not affect the others.
    pub async fn verify(&self, mapping: &[RouteExpectation]) -> Result<Vec<RoutingAssertion>> {
        if mapping.is_empty() {
            return Err(AppError::config("Routing mapping must contain at least one entry"));
        }
        if self.timeout.is_zero() {
            return Err(AppError::config("Probe timeout must be greater than zero"));
        }

        let request = ProbeRequest::new(self.probe_message.clone(), self.timeout);
        let checks = mapping
            .iter()
            .map(|expectation| self.check(&expectation.endpoint, &expectation.expected_backend, &request));

        Ok(join_all(checks).await)
    }

    async fn check(&self, endpoint: &Endpoint, expected_backend: &str, request: &ProbeRequest) -> RoutingAssertion {
        let actual = attributed_probe(self.prober.as_ref(), &self.attributor, endpoint, request).await;
        self.logger.log_outcome(endpoint, &actual, None).await;
        RoutingAssertion::evaluate(endpoint.clone(), expected_backend.to_string(), actual)
    }
}

/// Pass/fail tally over a set of routing assertions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSummary {
    pub total: usize,
    pub passed: usize,
    /// Entry points whose assertion failed, with the reason
    pub failures: Vec<RoutingFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingFailure {
    pub endpoint: String,
    pub expected_backend: String,
    pub reason: String,
}

impl RoutingSummary {
    pub fn from_assertions(assertions: &[RoutingAssertion]) -> Self {
        let failures: Vec<RoutingFailure> = assertions
            .iter()
            .filter_map(|assertion| {
                assertion.failure_reason().map(|reason| RoutingFailure {
                    endpoint: assertion.endpoint.to_string(),
                    expected_backend: assertion.expected_backend.clone(),
                    reason,
                })
            })
            .collect();

        Self {
            total: assertions.len(),
            passed: assertions.len() - failures.len(),
            failures,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}
