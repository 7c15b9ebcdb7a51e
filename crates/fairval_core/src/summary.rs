//! Percentile and moment summaries of simulated valuation samples.

use crate::math::percentile_sorted;
use crate::model::{DistributionSummary, MetricType, SimulationDiagnostics, SummaryStatistics};

/// Summarize a non-empty sample set. The input need not be sorted.
///
/// Standard deviation is the sample estimate (n - 1 denominator), zero
/// for a single observation.
#[must_use]
pub fn summarize(samples: &[f64]) -> SummaryStatistics {
    debug_assert!(!samples.is_empty());
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std_dev = if sorted.len() < 2 {
        0.0
    } else {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };

    SummaryStatistics {
        percentile_5: percentile_sorted(&sorted, 0.05),
        percentile_25: percentile_sorted(&sorted, 0.25),
        median: percentile_sorted(&sorted, 0.50),
        percentile_75: percentile_sorted(&sorted, 0.75),
        percentile_95: percentile_sorted(&sorted, 0.95),
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    }
}

/// Package one metric's samples with its tag, seed, and run diagnostics.
#[must_use]
pub fn build_summary(
    samples: &[f64],
    metric_type: MetricType,
    seed: u64,
    diagnostics: SimulationDiagnostics,
) -> DistributionSummary {
    DistributionSummary {
        metric_type,
        iterations: diagnostics.iterations_executed,
        seed,
        summary: summarize(samples),
        diagnostics,
    }
}
