//! Run outputs: tagged summaries, diagnostics, and the result payload.

use std::collections::BTreeMap;
use std::fmt;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::assumptions::AssumptionRecord;
use super::correlation::RepairPolicy;
use crate::config::FreshnessPolicy;

/// Unit semantics of a distributional quantity.
///
/// Every summary carries one of these. A total equity value surfaced as a
/// per-share price is exactly the defect this tag exists to prevent;
/// consumers must branch on it before rendering, and suppress rather than
/// guess when conversion inputs are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    EquityValueTotal,
    IntrinsicValuePerShare,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::EquityValueTotal => write!(f, "equity_value_total"),
            MetricType::IntrinsicValuePerShare => write!(f, "intrinsic_value_per_share"),
        }
    }
}

/// Order statistics and moments of one metric's sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub median: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// How the run actually went: convergence, exclusions, PSD repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDiagnostics {
    /// Percentile deltas fell below tolerance at some checkpoint. Stays
    /// false when convergence tracking is disabled.
    pub converged: bool,
    pub stopped_early: bool,
    pub iterations_requested: usize,
    pub iterations_executed: usize,
    /// Valid samples actually aggregated (executed minus excluded).
    pub effective_window: usize,
    pub excluded_iterations: usize,
    pub psd_repaired: bool,
    pub psd_repaired_groups: Vec<String>,
    /// Populated only on the error path; a run with a failed group never
    /// produces a payload. Kept in the schema for consumers.
    pub psd_repair_failed_groups: Vec<String>,
    pub psd_repair_policy_used: Option<RepairPolicy>,
    /// Smallest eigenvalue across groups before/after repair; absent when
    /// the run had no correlation groups.
    pub psd_min_eigen_before: Option<f64>,
    pub psd_min_eigen_after: Option<f64>,
}

/// Summary of one metric's simulated distribution, unit-tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub metric_type: MetricType,
    pub iterations: usize,
    pub seed: u64,
    pub summary: SummaryStatistics,
    pub diagnostics: SimulationDiagnostics,
}

/// Both tagged summaries produced by one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub equity: DistributionSummary,
    pub per_share: DistributionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataFreshness {
    pub provider: String,
    pub as_of: Date,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeAlignmentReport {
    pub gap_days: i32,
    pub threshold_days: i32,
    pub policy: FreshnessPolicy,
    pub breached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFreshness {
    pub market_data: MarketDataFreshness,
    pub time_alignment: TimeAlignmentReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionBreakdown {
    pub assumptions: Vec<AssumptionRecord>,
    pub key_parameters: BTreeMap<String, f64>,
}

/// The full valuation payload handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Median total equity value.
    pub equity_value: f64,
    /// Median per-share intrinsic value.
    pub intrinsic_value: f64,
    pub shares_outstanding_used: f64,
    /// (intrinsic - current price) / current price.
    pub upside_potential: f64,
    pub distribution_summary: DistributionSummary,
    pub assumption_breakdown: AssumptionBreakdown,
    pub data_freshness: DataFreshness,
}
