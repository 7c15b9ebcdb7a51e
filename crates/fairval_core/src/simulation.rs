//! Monte Carlo engine: batched scenario evaluation, convergence
//! tracking, and the top-level valuation entry points.
//!
//! The loop runs in batches (checkpoint-interval sized when convergence
//! tracking is on). Within a batch, iterations evaluate independently,
//! in parallel under the `parallel` feature; every iteration derives its
//! own RNG sub-stream from the run seed, so results are bit-identical
//! across batch sizes and thread counts. Scenarios whose arithmetic
//! fails are excluded and counted, never silently zeroed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rustc_hash::FxHashMap;

use crate::config::{MonteCarloConfig, ValuationRequest};
use crate::error::{ScenarioError, SimulationError, ValidationError, ValuationError};
use crate::math::percentile_sorted;
use crate::model::{
    AssumptionBreakdown, CorrelationGroup, Distribution, MetricType, SimulationDiagnostics,
    SimulationSummary, ValuationParams, ValuationResult,
};
use crate::resolve::ParamResolver;
use crate::sampler::{self, PreparedSampling};
use crate::summary::build_summary;
use crate::valuation::{ScenarioValuation, ValuationModel};

/// Shared progress and cancellation handle for a running simulation.
///
/// Clones share the same counters. The completed count is advanced by
/// the engine after each batch; setting the cancel flag stops the run at
/// the next batch boundary with [`SimulationError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    completed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl RunProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a handle over externally owned counters, for callers that
    /// poll progress from another thread or an FFI boundary.
    #[must_use]
    pub fn from_atomics(completed: Arc<AtomicUsize>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            completed,
            cancelled,
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, count: usize) {
        self.completed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// The simulation engine for one run configuration.
pub struct MonteCarloEngine {
    config: MonteCarloConfig,
}

impl MonteCarloEngine {
    #[must_use]
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    /// Run the simulation and summarize both metrics.
    ///
    /// The equity-value samples drive convergence checkpoints; per-share
    /// values are the same samples scaled by shares outstanding, so their
    /// relative percentile deltas are identical.
    pub fn run(
        &self,
        model: &ValuationModel,
        params: &ValuationParams,
        distributions: &FxHashMap<String, Distribution>,
        groups: &[CorrelationGroup],
        progress: &RunProgress,
    ) -> Result<SimulationSummary, SimulationError> {
        const DEFAULT_BATCH_SIZE: usize = 1_024;

        if self.config.iterations == 0 {
            return Err(SimulationError::Validation(ValidationError::ZeroIterations));
        }
        if model.family() != params.model_family() {
            return Err(SimulationError::Validation(
                ValidationError::FamilyMismatch {
                    expected: model.family(),
                    got: params.model_family(),
                },
            ));
        }

        let prepared = sampler::prepare(distributions, groups, &self.config.repair)?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let batch_size = self
            .config
            .convergence
            .map_or(DEFAULT_BATCH_SIZE, |c| c.check_interval.max(1));

        let total = self.config.iterations;
        let mut equity = Vec::with_capacity(total);
        let mut per_share = Vec::with_capacity(total);
        let mut executed = 0usize;
        let mut excluded = 0usize;
        let mut converged = false;
        let mut stopped_early = false;
        let mut previous_checkpoint: Option<(f64, f64)> = None;

        while executed < total {
            if progress.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }
            let batch = (total - executed).min(batch_size);
            let outcomes = evaluate_batch(&prepared, model, params, seed, executed as u64, batch);

            for (iteration, outcome) in outcomes {
                match outcome {
                    Ok(valuation) => {
                        equity.push(valuation.equity_value);
                        per_share.push(valuation.per_share_value);
                    }
                    Err(error) => {
                        excluded += 1;
                        tracing::debug!(iteration = iteration, error = %error, "Scenario excluded");
                    }
                }
            }
            executed += batch;
            progress.add(batch);

            if excluded as f64 > self.config.max_exclusion_rate * executed as f64 {
                return Err(SimulationError::ExcessiveExclusions {
                    excluded,
                    executed,
                    max_rate: self.config.max_exclusion_rate,
                });
            }

            if let Some(convergence) = &self.config.convergence
                && executed >= convergence.min_iterations
                && !equity.is_empty()
            {
                let mut sorted = equity.clone();
                sorted.sort_unstable_by(f64::total_cmp);
                let p50 = percentile_sorted(&sorted, 0.50);
                let p95 = percentile_sorted(&sorted, 0.95);
                if let Some((prev_p50, prev_p95)) = previous_checkpoint {
                    let delta_p50 = relative_delta(p50, prev_p50);
                    let delta_p95 = relative_delta(p95, prev_p95);
                    if delta_p50 < convergence.relative_tolerance
                        && delta_p95 < convergence.relative_tolerance
                    {
                        converged = true;
                        stopped_early = executed < total;
                        tracing::debug!(
                            executed = executed,
                            delta_p50 = delta_p50,
                            delta_p95 = delta_p95,
                            "Percentiles stabilized, stopping early"
                        );
                        break;
                    }
                }
                previous_checkpoint = Some((p50, p95));
            }
        }

        if equity.is_empty() {
            return Err(SimulationError::NoValidScenarios);
        }
        if self.config.convergence.is_some() && !converged {
            tracing::warn!(
                executed = executed,
                "Percentile deltas never fell below tolerance, treat tails with care"
            );
        }

        let report = prepared.report();
        let diagnostics = SimulationDiagnostics {
            converged,
            stopped_early,
            iterations_requested: total,
            iterations_executed: executed,
            effective_window: equity.len(),
            excluded_iterations: excluded,
            psd_repaired: report.any_repaired(),
            psd_repaired_groups: report.repaired_groups.clone(),
            psd_repair_failed_groups: Vec::new(),
            psd_repair_policy_used: (!groups.is_empty()).then_some(report.policy),
            psd_min_eigen_before: report.min_eigen_before,
            psd_min_eigen_after: report.min_eigen_after,
        };

        Ok(SimulationSummary {
            equity: build_summary(
                &equity,
                MetricType::EquityValueTotal,
                seed,
                diagnostics.clone(),
            ),
            per_share: build_summary(
                &per_share,
                MetricType::IntrinsicValuePerShare,
                seed,
                diagnostics,
            ),
        })
    }
}

fn relative_delta(current: f64, previous: f64) -> f64 {
    (current - previous).abs() / previous.abs().max(1e-12)
}

fn evaluate_one(
    prepared: &PreparedSampling,
    model: &ValuationModel,
    params: &ValuationParams,
    seed: u64,
    iteration: u64,
) -> Result<ScenarioValuation, ScenarioError> {
    let scenario = prepared.draw(seed, iteration);
    model.evaluate(params, &scenario)
}

#[cfg(feature = "parallel")]
fn evaluate_batch(
    prepared: &PreparedSampling,
    model: &ValuationModel,
    params: &ValuationParams,
    seed: u64,
    start: u64,
    count: usize,
) -> Vec<(u64, Result<ScenarioValuation, ScenarioError>)> {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    (0..count)
        .into_par_iter()
        .map(|offset| {
            let iteration = start + offset as u64;
            (
                iteration,
                evaluate_one(prepared, model, params, seed, iteration),
            )
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_batch(
    prepared: &PreparedSampling,
    model: &ValuationModel,
    params: &ValuationParams,
    seed: u64,
    start: u64,
    count: usize,
) -> Vec<(u64, Result<ScenarioValuation, ScenarioError>)> {
    (0..count)
        .map(|offset| {
            let iteration = start + offset as u64;
            (
                iteration,
                evaluate_one(prepared, model, params, seed, iteration),
            )
        })
        .collect()
}

/// Resolve, simulate, and assemble the valuation payload.
pub fn run_valuation(request: &ValuationRequest) -> Result<ValuationResult, ValuationError> {
    run_valuation_with_progress(request, &RunProgress::new())
}

/// [`run_valuation`] with an externally observable progress handle.
pub fn run_valuation_with_progress(
    request: &ValuationRequest,
    progress: &RunProgress,
) -> Result<ValuationResult, ValuationError> {
    let resolved = ParamResolver::new(&request.resolver).resolve(
        &request.market,
        &request.fundamentals,
        request.family,
    )?;
    let model = request
        .model
        .clone()
        .unwrap_or_else(|| ValuationModel::for_family(request.family));

    let engine = MonteCarloEngine::new(request.monte_carlo.clone());
    let summary = engine.run(
        &model,
        &resolved.params,
        &request.distributions,
        &request.correlation_groups,
        progress,
    )?;

    let equity_value = summary.equity.summary.median;
    let intrinsic_value = summary.per_share.summary.median;
    let current_price = resolved.params.current_price.value;
    let upside_potential = (intrinsic_value - current_price) / current_price;
    let key_parameters = resolved.params.key_parameters();

    tracing::info!(
        equity_value = equity_value,
        intrinsic_value = intrinsic_value,
        upside_potential = upside_potential,
        iterations = summary.per_share.diagnostics.iterations_executed,
        "Valuation complete"
    );

    Ok(ValuationResult {
        equity_value,
        intrinsic_value,
        shares_outstanding_used: resolved.params.shares_outstanding.value,
        upside_potential,
        distribution_summary: summary.per_share,
        assumption_breakdown: AssumptionBreakdown {
            assumptions: resolved.assumptions,
            key_parameters,
        },
        data_freshness: resolved.freshness,
    })
}
