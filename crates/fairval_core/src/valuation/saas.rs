//! Free-cash-flow DCF for SaaS and other growth companies.
//!
//! Free cash flow compounds at the scenario growth rate over the
//! projection horizon; a Gordon terminal value at the terminal growth
//! rate is discounted back along with the explicit flows.

use crate::error::ScenarioError;
use crate::model::{SaasParams, ValuationParams};
use crate::sampler::ScenarioSample;

use super::{ScenarioValuation, vars};

pub(super) fn evaluate(
    params: &ValuationParams,
    saas: &SaasParams,
    scenario: &ScenarioSample<'_>,
    projection_years: usize,
    terminal_growth: f64,
) -> Result<ScenarioValuation, ScenarioError> {
    let coe = super::cost_of_equity(params, scenario)?;
    let growth = super::growth_rate(params, scenario)?;
    let terminal = scenario.value_or(vars::TERMINAL_GROWTH, terminal_growth);
    let spread = super::terminal_spread(coe, terminal)?;

    let mut cash_flow = saas.free_cash_flow;
    let mut discount = 1.0;
    let mut pv_flows = 0.0;
    for _ in 0..projection_years {
        cash_flow *= 1.0 + growth;
        discount *= 1.0 + coe;
        pv_flows += cash_flow / discount;
    }

    let terminal_value = cash_flow * (1.0 + terminal) / spread;
    let equity_value = pv_flows + terminal_value / discount;
    super::finalize(equity_value, params.shares_outstanding.value)
}
