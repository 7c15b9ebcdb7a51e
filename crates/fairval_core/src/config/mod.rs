//! Run configuration: resolver policies, simulation knobs, and the
//! valuation request assembled by the fluent builder.

mod builder;

pub use builder::ValuationRequestBuilder;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::growth::GrowthBlendConfig;
use crate::model::{
    CorrelationGroup, CostOfEquity, Distribution, FundamentalsSnapshot, MarketSnapshot,
    ModelFamily, RepairConfig,
};
use crate::valuation::ValuationModel;

/// Stock maintenance-capex share of depreciation for the REIT AFFO
/// derivation, used when no override is configured.
pub const DEFAULT_MAINTENANCE_CAPEX_RATIO: f64 = 0.8;

/// What to do when market data and filing period drift too far apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessPolicy {
    /// Record a high-severity assumption and continue.
    #[default]
    Warn,
    /// Abort parameter resolution.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAlignmentConfig {
    #[serde(default = "default_threshold_days")]
    pub threshold_days: i32,
    #[serde(default)]
    pub policy: FreshnessPolicy,
}

fn default_threshold_days() -> i32 {
    365
}

impl Default for TimeAlignmentConfig {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            policy: FreshnessPolicy::default(),
        }
    }
}

/// Hard-reject limits for bank parameters. These are regulatory-shaped
/// sanity rails, configurable but never silently relaxable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BankGuardrails {
    #[serde(default = "default_max_tier1_target_ratio")]
    pub max_tier1_target_ratio: f64,
    #[serde(default = "default_max_rwa_intensity")]
    pub max_rwa_intensity: f64,
}

fn default_max_tier1_target_ratio() -> f64 {
    0.30
}

fn default_max_rwa_intensity() -> f64 {
    0.20
}

impl Default for BankGuardrails {
    fn default() -> Self {
        Self {
            max_tier1_target_ratio: default_max_tier1_target_ratio(),
            max_rwa_intensity: default_max_rwa_intensity(),
        }
    }
}

/// Everything the resolver needs beyond the snapshots themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub time_alignment: TimeAlignmentConfig,
    #[serde(default)]
    pub guardrails: BankGuardrails,
    /// Relative deviation of the latest RWA from its historical median
    /// beyond which the median return-on-RWA fallback kicks in.
    #[serde(default = "default_rwa_continuity_threshold")]
    pub rwa_continuity_threshold: f64,
    #[serde(default = "default_risk_free_rate")]
    pub default_risk_free_rate: f64,
    #[serde(default = "default_beta")]
    pub default_beta: f64,
    /// CAPM premium used when the cost-of-equity strategy is the default.
    #[serde(default = "default_equity_risk_premium")]
    pub equity_risk_premium: f64,
    /// `None` resolves the discount rate through CAPM with
    /// [`ResolverConfig::equity_risk_premium`]; `Some` pins an explicit
    /// strategy instead.
    #[serde(default)]
    pub cost_of_equity: Option<CostOfEquity>,
    /// Maintenance-capex ratio override for REITs. `None` uses
    /// [`DEFAULT_MAINTENANCE_CAPEX_RATIO`] and records a `default`
    /// assumption; `Some` records an `override` assumption.
    #[serde(default)]
    pub maintenance_capex_ratio: Option<f64>,
    #[serde(default)]
    pub growth: GrowthBlendConfig,
}

fn default_rwa_continuity_threshold() -> f64 {
    0.35
}

fn default_risk_free_rate() -> f64 {
    0.04
}

fn default_beta() -> f64 {
    1.0
}

fn default_equity_risk_premium() -> f64 {
    0.055
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            time_alignment: TimeAlignmentConfig::default(),
            guardrails: BankGuardrails::default(),
            rwa_continuity_threshold: default_rwa_continuity_threshold(),
            default_risk_free_rate: default_risk_free_rate(),
            default_beta: default_beta(),
            equity_risk_premium: default_equity_risk_premium(),
            cost_of_equity: None,
            maintenance_capex_ratio: None,
            growth: GrowthBlendConfig::default(),
        }
    }
}

/// Early-stop tracking over P50/P95 checkpoint deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// No early stop before this many iterations have executed.
    #[serde(default = "default_min_iterations")]
    pub min_iterations: usize,
    /// Checkpoint spacing in iterations; also the batch size of the loop.
    #[serde(default = "default_check_interval")]
    pub check_interval: usize,
    /// Maximum relative P50/P95 movement between checkpoints that still
    /// counts as converged.
    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
}

fn default_min_iterations() -> usize {
    2_000
}

fn default_check_interval() -> usize {
    1_000
}

fn default_relative_tolerance() -> f64 {
    0.005
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            min_iterations: default_min_iterations(),
            check_interval: default_check_interval(),
            relative_tolerance: default_relative_tolerance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// `None` draws a fresh seed from entropy; the seed actually used is
    /// always reported in the summary.
    #[serde(default)]
    pub seed: Option<u64>,
    /// `None` disables convergence tracking; the run then always executes
    /// the full requested count.
    #[serde(default = "default_convergence")]
    pub convergence: Option<ConvergenceConfig>,
    /// Excluded-scenario share above which the run fails.
    #[serde(default = "default_max_exclusion_rate")]
    pub max_exclusion_rate: f64,
    #[serde(default)]
    pub repair: RepairConfig,
}

fn default_iterations() -> usize {
    10_000
}

fn default_convergence() -> Option<ConvergenceConfig> {
    Some(ConvergenceConfig::default())
}

fn default_max_exclusion_rate() -> f64 {
    0.05
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: None,
            convergence: default_convergence(),
            max_exclusion_rate: default_max_exclusion_rate(),
            repair: RepairConfig::default(),
        }
    }
}

/// One complete valuation request: snapshots, family, uncertainty
/// specification, and run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub market: MarketSnapshot,
    pub fundamentals: FundamentalsSnapshot,
    pub family: ModelFamily,
    /// `None` uses the family's default model settings.
    #[serde(default)]
    pub model: Option<ValuationModel>,
    #[serde(default)]
    pub distributions: FxHashMap<String, Distribution>,
    #[serde(default)]
    pub correlation_groups: Vec<CorrelationGroup>,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

impl ValuationRequest {
    #[must_use]
    pub fn builder(family: ModelFamily) -> ValuationRequestBuilder {
        ValuationRequestBuilder::new(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policies() {
        let resolver = ResolverConfig::default();
        assert_eq!(resolver.time_alignment.threshold_days, 365);
        assert_eq!(resolver.time_alignment.policy, FreshnessPolicy::Warn);
        assert_eq!(resolver.guardrails.max_tier1_target_ratio, 0.30);
        assert_eq!(resolver.guardrails.max_rwa_intensity, 0.20);
        assert!(resolver.maintenance_capex_ratio.is_none());

        let mc = MonteCarloConfig::default();
        assert_eq!(mc.iterations, 10_000);
        assert!(mc.convergence.is_some());
        assert!(mc.seed.is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let mc: MonteCarloConfig = serde_json::from_str(r#"{"iterations": 500}"#).unwrap();
        assert_eq!(mc.iterations, 500);
        assert_eq!(mc.max_exclusion_rate, 0.05);
        assert!(mc.convergence.is_some());
    }
}
