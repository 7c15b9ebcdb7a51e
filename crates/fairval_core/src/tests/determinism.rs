//! Tests for seeded reproducibility, convergence, and exclusion handling
//!
//! These tests verify:
//! - Same seed, same results, bit for bit, independent of batch size
//! - The seed actually used is always reported
//! - Early stop triggers and is visible in the diagnostics
//! - Excluded scenarios shrink the window or abort the run
//! - A cancelled handle stops the run before the next batch

use jiff::civil::date;

use rustc_hash::FxHashMap;

use crate::config::{ConvergenceConfig, MonteCarloConfig, ValuationRequest};
use crate::error::SimulationError;
use crate::model::{
    CorrelationGroup, CostOfEquity, Distribution, FamilyParams, FundamentalsSnapshot,
    MarketSnapshot, ModelFamily, ParamSource, SaasFundamentals, SaasParams, SourcedValue,
    ValuationParams,
};
use crate::simulation::{MonteCarloEngine, RunProgress, run_valuation};
use crate::valuation::{ValuationModel, vars};

fn saas_params() -> ValuationParams {
    let sourced = |v: f64| SourcedValue::new(v, ParamSource::MarketData, date(2025, 6, 30));
    ValuationParams {
        shares_outstanding: sourced(10.0),
        current_price: sourced(90.0),
        risk_free_rate: sourced(0.04),
        beta: sourced(1.0),
        discount_rate: sourced(0.10),
        blended_growth: SourcedValue::new(0.03, ParamSource::Blended, date(2025, 6, 30)),
        cost_of_equity: CostOfEquity::Fixed { rate: 0.10 },
        family: FamilyParams::Saas(SaasParams {
            free_cash_flow: 100.0,
        }),
    }
}

fn stochastic_inputs() -> (FxHashMap<String, Distribution>, Vec<CorrelationGroup>) {
    let mut distributions = FxHashMap::default();
    distributions.insert(
        vars::GROWTH_RATE.to_string(),
        Distribution::normal(0.05, 0.015).with_bounds(-0.02, 0.12),
    );
    distributions.insert(
        vars::DISCOUNT_RATE.to_string(),
        Distribution::normal(0.11, 0.01).with_bounds(0.08, 0.14),
    );
    let group = CorrelationGroup::new(
        "rates",
        vec![vars::GROWTH_RATE.to_string(), vars::DISCOUNT_RATE.to_string()],
        vec![vec![1.0, -0.5], vec![-0.5, 1.0]],
    );
    (distributions, vec![group])
}

fn stochastic_request(seed: u64) -> ValuationRequest {
    let market = MarketSnapshot {
        current_price: Some(60.0),
        shares_outstanding: Some(800.0e6),
        beta: Some(1.2),
        risk_free_rate: Some(0.04),
        consensus_growth_rate: Some(0.05),
        target_mean_price: Some(75.0),
        ..MarketSnapshot::new("test-feed", date(2025, 6, 30))
    };
    let fundamentals = FundamentalsSnapshot {
        shares_outstanding: Some(800.0e6),
        revenue_history: vec![1.8e9, 2.0e9, 2.2e9],
        saas: Some(SaasFundamentals {
            free_cash_flow: 500.0e6,
        }),
        ..FundamentalsSnapshot::new(date(2025, 3, 31))
    };
    ValuationRequest::builder(ModelFamily::Saas)
        .market(market)
        .fundamentals(fundamentals)
        .distribution(
            vars::GROWTH_RATE,
            Distribution::normal(0.05, 0.015).with_bounds(-0.02, 0.12),
        )
        .distribution(
            vars::DISCOUNT_RATE,
            Distribution::normal(0.11, 0.01).with_bounds(0.08, 0.14),
        )
        .correlation_group(CorrelationGroup::new(
            "rates",
            vec![vars::GROWTH_RATE.to_string(), vars::DISCOUNT_RATE.to_string()],
            vec![vec![1.0, -0.5], vec![-0.5, 1.0]],
        ))
        .monte_carlo(MonteCarloConfig {
            iterations: 3000,
            seed: Some(seed),
            convergence: None,
            ..MonteCarloConfig::default()
        })
        .build()
        .unwrap()
}

/// Test that two runs with the same seed agree on every reported statistic
#[test]
fn test_same_seed_is_bit_identical() {
    let first = run_valuation(&stochastic_request(99)).unwrap();
    let second = run_valuation(&stochastic_request(99)).unwrap();

    let (a, b) = (
        &first.distribution_summary.summary,
        &second.distribution_summary.summary,
    );
    assert_eq!(
        [a.percentile_5, a.percentile_25, a.median, a.percentile_75, a.percentile_95],
        [b.percentile_5, b.percentile_25, b.median, b.percentile_75, b.percentile_95],
    );
    assert_eq!(a.mean, b.mean);
    assert_eq!(a.std_dev, b.std_dev);
    assert_eq!(a.min, b.min);
    assert_eq!(a.max, b.max);
    assert_eq!(first.distribution_summary.seed, 99);
    assert_eq!(first.equity_value, second.equity_value);
}

/// Test that changing the seed changes the draws
#[test]
fn test_different_seeds_change_the_draws() {
    let first = run_valuation(&stochastic_request(1)).unwrap();
    let second = run_valuation(&stochastic_request(2)).unwrap();
    assert_ne!(
        first.distribution_summary.summary.median,
        second.distribution_summary.summary.median
    );
}

/// Test that batch size only partitions the loop and never changes the
/// sample stream
#[test]
fn test_results_do_not_depend_on_batch_size() {
    // Zero tolerance keeps the checkpoints from ever stopping the run, so
    // the interval only controls batching.
    let engine_with_interval = |interval: usize| {
        MonteCarloEngine::new(MonteCarloConfig {
            iterations: 2000,
            seed: Some(21),
            convergence: Some(ConvergenceConfig {
                min_iterations: 1,
                check_interval: interval,
                relative_tolerance: 0.0,
            }),
            ..MonteCarloConfig::default()
        })
    };
    let (distributions, groups) = stochastic_inputs();
    let model = ValuationModel::for_family(ModelFamily::Saas);
    let params = saas_params();

    let small_batches = engine_with_interval(64)
        .run(&model, &params, &distributions, &groups, &RunProgress::new())
        .unwrap();
    let large_batches = engine_with_interval(997)
        .run(&model, &params, &distributions, &groups, &RunProgress::new())
        .unwrap();

    assert_eq!(small_batches.equity.summary, large_batches.equity.summary);
    assert_eq!(
        small_batches.per_share.summary,
        large_batches.per_share.summary
    );
    assert_eq!(small_batches.equity.diagnostics.iterations_executed, 2000);
}

/// Test that a run without a configured seed reports the one it drew
#[test]
fn test_entropy_seed_is_reported() {
    let config = MonteCarloConfig {
        iterations: 20,
        seed: None,
        convergence: None,
        ..MonteCarloConfig::default()
    };
    let engine = MonteCarloEngine::new(config);
    let model = ValuationModel::for_family(ModelFamily::Saas);
    let params = saas_params();

    let first = engine
        .run(&model, &params, &FxHashMap::default(), &[], &RunProgress::new())
        .unwrap();
    let second = engine
        .run(&model, &params, &FxHashMap::default(), &[], &RunProgress::new())
        .unwrap();
    assert_eq!(first.equity.seed, first.per_share.seed);
    assert_ne!(first.equity.seed, second.equity.seed);
}

/// Test that stable percentiles stop the run early with full diagnostics
#[test]
fn test_early_stop_reports_convergence() {
    // No distributions: every scenario is identical, so the second
    // checkpoint sees zero delta and stops the run.
    let config = MonteCarloConfig {
        iterations: 10_000,
        seed: Some(5),
        convergence: Some(ConvergenceConfig {
            min_iterations: 100,
            check_interval: 50,
            relative_tolerance: 0.005,
        }),
        ..MonteCarloConfig::default()
    };
    let progress = RunProgress::new();
    let summary = MonteCarloEngine::new(config)
        .run(
            &ValuationModel::for_family(ModelFamily::Saas),
            &saas_params(),
            &FxHashMap::default(),
            &[],
            &progress,
        )
        .unwrap();

    let diag = &summary.per_share.diagnostics;
    assert!(diag.converged);
    assert!(diag.stopped_early);
    assert_eq!(diag.iterations_requested, 10_000);
    assert_eq!(diag.iterations_executed, 150);
    assert_eq!(diag.effective_window, 150);
    assert_eq!(summary.per_share.iterations, 150);
    assert_eq!(progress.completed(), 150);
}

/// Test that disabling convergence tracking runs every iteration and
/// reports converged = false
#[test]
fn test_convergence_disabled_runs_every_iteration() {
    let mut distributions = FxHashMap::default();
    distributions.insert(
        vars::GROWTH_RATE.to_string(),
        Distribution::normal(0.03, 0.01).with_bounds(0.0, 0.06),
    );
    let config = MonteCarloConfig {
        iterations: 500,
        seed: Some(2),
        convergence: None,
        ..MonteCarloConfig::default()
    };
    let progress = RunProgress::new();
    let summary = MonteCarloEngine::new(config)
        .run(
            &ValuationModel::for_family(ModelFamily::Saas),
            &saas_params(),
            &distributions,
            &[],
            &progress,
        )
        .unwrap();

    let diag = &summary.equity.diagnostics;
    assert!(!diag.converged);
    assert!(!diag.stopped_early);
    assert_eq!(diag.iterations_executed, 500);
    assert_eq!(diag.effective_window, 500);
    assert_eq!(progress.completed(), 500);
    assert!(summary.equity.summary.std_dev > 0.0);
}

/// Test that an exclusion rate above the budget aborts the run
#[test]
fn test_excessive_exclusions_abort_the_run() {
    let mut distributions = FxHashMap::default();
    // Terminal-growth draws straddle the 10% cost of equity, so roughly
    // half the scenarios have no positive spread.
    distributions.insert(
        vars::TERMINAL_GROWTH.to_string(),
        Distribution::uniform(0.05, 0.15),
    );
    let config = MonteCarloConfig {
        iterations: 1000,
        seed: Some(9),
        convergence: None,
        ..MonteCarloConfig::default()
    };
    let err = MonteCarloEngine::new(config)
        .run(
            &ValuationModel::SaasDcf {
                projection_years: 1,
                terminal_growth: 0.025,
            },
            &saas_params(),
            &distributions,
            &[],
            &RunProgress::new(),
        )
        .unwrap_err();

    match err {
        SimulationError::ExcessiveExclusions {
            excluded,
            executed,
            max_rate,
        } => {
            assert!(excluded > 50, "excluded only {excluded} of {executed}");
            assert_eq!(executed, 1000);
            assert_eq!(max_rate, 0.05);
        }
        other => panic!("expected an exclusion abort, got {other:?}"),
    }
}

/// Test that exclusions under the budget shrink the effective window
/// without failing the run
#[test]
fn test_exclusions_shrink_the_effective_window() {
    let mut distributions = FxHashMap::default();
    // About 2% of draws exceed the 10% cost of equity.
    distributions.insert(
        vars::TERMINAL_GROWTH.to_string(),
        Distribution::uniform(0.0, 0.102),
    );
    let config = MonteCarloConfig {
        iterations: 1000,
        seed: Some(4),
        convergence: None,
        ..MonteCarloConfig::default()
    };
    let summary = MonteCarloEngine::new(config)
        .run(
            &ValuationModel::SaasDcf {
                projection_years: 1,
                terminal_growth: 0.025,
            },
            &saas_params(),
            &distributions,
            &[],
            &RunProgress::new(),
        )
        .unwrap();

    let diag = &summary.equity.diagnostics;
    assert!(diag.excluded_iterations > 0, "the straddle must exclude something");
    assert!((diag.excluded_iterations as f64) < 0.05 * 1000.0);
    assert_eq!(diag.iterations_executed, 1000);
    assert_eq!(
        diag.effective_window,
        diag.iterations_executed - diag.excluded_iterations
    );
    assert!(summary.per_share.summary.median.is_finite());
}

/// Test that a cancelled progress handle aborts the run before any batch
/// is evaluated
#[test]
fn test_cancelled_run_aborts_without_a_payload() {
    let engine = MonteCarloEngine::new(MonteCarloConfig {
        iterations: 10_000,
        seed: Some(3),
        ..MonteCarloConfig::default()
    });
    let (distributions, groups) = stochastic_inputs();
    let progress = RunProgress::new();
    progress.cancel();

    let err = engine
        .run(
            &ValuationModel::for_family(ModelFamily::Saas),
            &saas_params(),
            &distributions,
            &groups,
            &progress,
        )
        .unwrap_err();

    assert_eq!(err, SimulationError::Cancelled);
    assert_eq!(progress.completed(), 0);
}
