//! Distribution analysis over the backend counts of a load run
//!
//! Everything here is a pure function of a finished `LoadRunResult`; no I/O.


use crate::{
    error::{AppError, Result},
    models::LoadRunResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of the run a single backend handled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendShare {
    pub count: u64,
    /// Percentage of all successful requests (0.0-100.0)
    pub percent_of_succeeded: f64,
    /// Fraction of attributed requests (0.0-1.0)
    pub share_of_attributed: f64,
}

/// Verdict on whether load spread across the expected backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub is_balanced: bool,
    /// Why the distribution is unbalanced; `None` when balanced
    pub skew_detail: Option<String>,
    pub expected_backends: usize,
    pub observed_backends: usize,
    pub dominance_threshold: f64,
    pub shares: BTreeMap<String, BackendShare>,
}

/// Decides whether a run's traffic was fanned out as intended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionAnalyzer {
    dominance_threshold: f64,
}

impl Default for DistributionAnalyzer {
    fn default() -> Self {
        Self {
            dominance_threshold: crate::defaults::DEFAULT_DOMINANCE_THRESHOLD,
        }
    }
}

impl DistributionAnalyzer {
    /// Create an analyzer; the threshold is the largest share of attributed
    /// traffic one backend may take and must lie in (0, 1]
    pub fn new(dominance_threshold: f64) -> Result<Self> {
        if !(dominance_threshold > 0.0 && dominance_threshold <= 1.0) {
            return Err(AppError::config(format!(
                "Dominance threshold must be in (0, 1], got {}",
                dominance_threshold
            )));
        }
        Ok(Self { dominance_threshold })
    }

    pub fn dominance_threshold(&self) -> f64 {
        self.dominance_threshold
    }

    /// Analyze the backend spread of `result`.
    ///
    /// Unbalanced when fewer distinct backends answered than expected, or, with
    /// two or more expected, when one backend's share of attributed traffic
    /// exceeds the dominance threshold.
    pub fn analyze(&self, result: &LoadRunResult, expected_backends: usize) -> DistributionReport {
        let attributed = result.attributed();
        let shares: BTreeMap<String, BackendShare> = result
            .per_backend_counts
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(backend, &count)| {
                let share = BackendShare {
                    count,
                    percent_of_succeeded: ratio(count, result.succeeded) * 100.0,
                    share_of_attributed: ratio(count, attributed),
                };
                (backend.clone(), share)
            })
            .collect();

        let observed = shares.len();
        let mut problems = Vec::new();

        if observed < expected_backends {
            problems.push(format!(
                "only {} of {} expected backends received traffic",
                observed, expected_backends
            ));
        }

        if expected_backends >= 2 {
            for (backend, share) in &shares {
                if share.share_of_attributed > self.dominance_threshold {
                    problems.push(format!(
                        "{} handled {:.1}% of attributed traffic (limit {:.1}%)",
                        backend,
                        share.share_of_attributed * 100.0,
                        self.dominance_threshold * 100.0
                    ));
                }
            }
        }

        DistributionReport {
            is_balanced: problems.is_empty(),
            skew_detail: if problems.is_empty() {
                None
            } else {
                Some(problems.join("; "))
            },
            expected_backends,
            observed_backends: observed,
            dominance_threshold: self.dominance_threshold,
            shares,
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
