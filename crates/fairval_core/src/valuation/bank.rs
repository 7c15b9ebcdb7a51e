//! Excess-capital dividend discount model for banks.
//!
//! The earnings driver is risk-weighted assets, not revenue. RWA grows at
//! the scenario growth rate, earnings are RWA times the return intensity,
//! and the distributable dividend each year is earnings minus the capital
//! retained to hold tier-1 at target against RWA growth. Capital already
//! above target is distributable at time zero.

use crate::error::ScenarioError;
use crate::model::{BankParams, ValuationParams};
use crate::sampler::ScenarioSample;

use super::{ScenarioValuation, vars};

pub(super) fn evaluate(
    params: &ValuationParams,
    bank: &BankParams,
    scenario: &ScenarioSample<'_>,
    projection_years: usize,
    terminal_growth: f64,
) -> Result<ScenarioValuation, ScenarioError> {
    let coe = super::cost_of_equity(params, scenario)?;
    let growth = super::growth_rate(params, scenario)?;
    let intensity = scenario.value_or(vars::RWA_INTENSITY, bank.rwa_intensity);
    let terminal = scenario.value_or(vars::TERMINAL_GROWTH, terminal_growth);
    let spread = super::terminal_spread(coe, terminal)?;

    let excess_capital = bank.initial_capital - bank.tier1_target_ratio * bank.initial_rwa;

    let mut rwa_prev = bank.initial_rwa;
    let mut discount = 1.0;
    let mut pv_dividends = 0.0;
    let mut last_dividend = 0.0;
    for _ in 0..projection_years {
        let rwa = rwa_prev * (1.0 + growth);
        let earnings = rwa * intensity;
        // Retained capital keeps tier-1 at target while RWA grows.
        let dividend = earnings - bank.tier1_target_ratio * (rwa - rwa_prev);
        discount *= 1.0 + coe;
        pv_dividends += dividend / discount;
        last_dividend = dividend;
        rwa_prev = rwa;
    }

    let terminal_value = last_dividend * (1.0 + terminal) / spread;
    let equity_value = excess_capital + pv_dividends + terminal_value / discount;
    super::finalize(equity_value, params.shares_outstanding.value)
}
