//! Concurrent load driver
//!
//! Fans a fixed sequence of probe requests out over a bounded set of workers,
//! attributes every reply, and folds the outcomes into a `LoadRunResult`.

pub mod resources;

pub use resources::SystemResources;

use crate::{
    attribution::Attributor,
    error::{AppError, Result},
    logging::{ProbeLogger, RunLogger},
    models::{AttributedOutcome, Endpoint, LatencySummary, LoadRunResult, ProbeOutcome, ProbeRequest},
    probe::Prober,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
    time::timeout,
};

/// Builders for the request sequences the harness sends
pub struct RequestPlan;

impl RequestPlan {
    /// `count` independent requests with payloads `{prefix}_0`, `{prefix}_1`, ...
    pub fn independent(count: usize, prefix: &str, request_timeout: Duration) -> Vec<ProbeRequest> {
        (0..count)
            .map(|i| ProbeRequest::new(format!("{}_{}", prefix, i), request_timeout))
            .collect()
    }

    /// `clients * per_client` requests tagged `CLIENT_{c}_REQUEST_{i}`
    pub fn per_client(clients: usize, per_client: usize, request_timeout: Duration) -> Vec<ProbeRequest> {
        (0..clients)
            .flat_map(|client| {
                (0..per_client).map(move |i| {
                    ProbeRequest::new(format!("CLIENT_{}_REQUEST_{}", client, i), request_timeout)
                })
            })
            .collect()
    }
}

/// Shared tally that every worker folds its outcome into
#[derive(Default)]
struct RunAccumulator {
    total: AtomicU64,
    succeeded: AtomicU64,
    timed_out: AtomicU64,
    transport_errors: AtomicU64,
    unattributed: AtomicU64,
    samples: Mutex<Samples>,
}

#[derive(Default)]
struct Samples {
    per_backend: HashMap<String, u64>,
    latencies: Vec<Duration>,
}

impl RunAccumulator {
    async fn record(&self, attributed: AttributedOutcome) {
        match attributed.outcome {
            ProbeOutcome::Success { latency, .. } => {
                let mut samples = self.samples.lock().await;
                samples.latencies.push(latency);
                match attributed.backend_id {
                    Some(backend) => *samples.per_backend.entry(backend).or_insert(0) += 1,
                    None => {
                        self.unattributed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            ProbeOutcome::Timeout { .. } => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            ProbeOutcome::TransportError { .. } => {
                self.transport_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    async fn finish(&self, total_duration: Duration) -> LoadRunResult {
        let samples = self.samples.lock().await;
        let timed_out = self.timed_out.load(Ordering::Relaxed);
        let transport_errors = self.transport_errors.load(Ordering::Relaxed);

        LoadRunResult {
            total_requests: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: timed_out + transport_errors,
            timed_out,
            transport_errors,
            unattributed: self.unattributed.load(Ordering::Relaxed),
            total_duration,
            per_backend_counts: samples
                .per_backend
                .iter()
                .map(|(backend, count)| (backend.clone(), *count))
                .collect::<BTreeMap<_, _>>(),
            latency: LatencySummary::from_latencies(&samples.latencies),
        }
    }
}

/// Probe once and attribute the reply
pub async fn attributed_probe(
    prober: &dyn Prober,
    attributor: &Attributor,
    endpoint: &Endpoint,
    request: &ProbeRequest,
) -> AttributedOutcome {
    let outcome = prober.probe(endpoint, request).await;
    let backend_id = outcome.payload().and_then(|payload| attributor.attribute(payload));
    AttributedOutcome::new(outcome, backend_id)
}

/// Runs many probes against one endpoint with bounded concurrency
pub struct LoadDriver {
    prober: Arc<dyn Prober>,
    attributor: Arc<Attributor>,
    run_deadline: Option<Duration>,
    probe_logger: ProbeLogger,
    run_logger: RunLogger,
}

impl LoadDriver {
    pub fn new(prober: Arc<dyn Prober>, attributor: Arc<Attributor>) -> Self {
        Self {
            prober,
            attributor,
            run_deadline: None,
            probe_logger: ProbeLogger::silent(),
            run_logger: RunLogger::silent(),
        }
    }

    /// Abort the whole run once this much wall-clock time has passed
    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn with_loggers(mut self, probe_logger: ProbeLogger, run_logger: RunLogger) -> Self {
        self.probe_logger = probe_logger;
        self.run_logger = run_logger;
        self
    }

    /// Send every request to `endpoint`, at most `concurrency` at a time.
    ///
    /// Each request is probed exactly once. Per-request failures are counted,
    /// not raised; only invalid arguments, a crashed worker or an exceeded run
    /// deadline produce an error.
    pub async fn run(
        &self,
        endpoint: &Endpoint,
        requests: Vec<ProbeRequest>,
        concurrency: usize,
    ) -> Result<LoadRunResult> {
        if concurrency == 0 {
            return Err(AppError::config("Concurrency must be at least 1"));
        }
        if requests.is_empty() {
            return Err(AppError::config("Load run needs at least one request"));
        }
        if requests.iter().any(|request| request.timeout.is_zero()) {
            return Err(AppError::config("Request timeout must be greater than zero"));
        }

        let correlation_id = self
            .run_logger
            .start_run(endpoint, requests.len(), concurrency)
            .await;

        let accumulator = Arc::new(RunAccumulator::default());
        let started = Instant::now();
        let dispatch = self.dispatch_all(endpoint, requests, concurrency, &accumulator, &correlation_id);

        match self.run_deadline {
            Some(deadline) => match timeout(deadline, dispatch).await {
                Ok(joined) => joined?,
                Err(_) => {
                    // The JoinSet was dropped with the future, aborting in-flight probes
                    self.run_logger.deadline_exceeded(&correlation_id, deadline).await;
                    return Err(AppError::timeout(format!(
                        "Load run against {} exceeded its {}ms deadline",
                        endpoint,
                        deadline.as_millis()
                    )));
                }
            },
            None => dispatch.await?,
        }

        let result = accumulator.finish(started.elapsed()).await;
        self.run_logger.end_run(&correlation_id, &result).await;
        Ok(result)
    }

    async fn dispatch_all(
        &self,
        endpoint: &Endpoint,
        requests: Vec<ProbeRequest>,
        concurrency: usize,
        accumulator: &Arc<RunAccumulator>,
        correlation_id: &str,
    ) -> Result<()> {
        // More permits than requests never helps and may exceed the semaphore's limit
        let limiter = Arc::new(Semaphore::new(concurrency.min(requests.len())));
        let mut workers = JoinSet::new();

        for request in requests {
            // Waiting here keeps at most `concurrency` probes spawned at once
            let permit = limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::internal(format!("Concurrency limiter closed: {}", e)))?;

            let prober = Arc::clone(&self.prober);
            let attributor = Arc::clone(&self.attributor);
            let accumulator = Arc::clone(accumulator);
            let probe_logger = self.probe_logger.clone();
            let endpoint = endpoint.clone();
            let correlation_id = correlation_id.to_string();

            workers.spawn(async move {
                let attributed = attributed_probe(prober.as_ref(), &attributor, &endpoint, &request).await;
                probe_logger
                    .log_outcome(&endpoint, &attributed, Some(&correlation_id))
                    .await;
                accumulator.record(attributed).await;
                drop(permit);
            });

            // Reap finished workers so a crash surfaces early
            while let Some(joined) = workers.try_join_next() {
                joined?;
            }
        }

        while let Some(joined) = workers.join_next().await {
            joined?;
        }
        Ok(())
    }
}
