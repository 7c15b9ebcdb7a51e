//! FFO/AFFO capitalization model for REITs.
//!
//! Adjusted funds from operations is FFO minus the maintenance share of
//! depreciation. Equity value is a single-stage Gordon capitalization of
//! next year's AFFO at the cost of equity.

use crate::error::ScenarioError;
use crate::model::{ReitParams, ValuationParams};
use crate::sampler::ScenarioSample;

use super::{ScenarioValuation, vars};

pub(super) fn evaluate(
    params: &ValuationParams,
    reit: &ReitParams,
    scenario: &ScenarioSample<'_>,
) -> Result<ScenarioValuation, ScenarioError> {
    let coe = super::cost_of_equity(params, scenario)?;
    let growth = super::growth_rate(params, scenario)?;
    let capex_ratio =
        scenario.value_or(vars::MAINTENANCE_CAPEX_RATIO, reit.maintenance_capex_ratio);
    let spread = super::terminal_spread(coe, growth)?;

    let affo = reit.funds_from_operations - capex_ratio * reit.depreciation;
    let equity_value = affo * (1.0 + growth) / spread;
    super::finalize(equity_value, params.shares_outstanding.value)
}
