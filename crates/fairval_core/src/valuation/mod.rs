//! Valuation model families and per-scenario evaluation.
//!
//! A [`ValuationModel`] is the closed-form (or short-horizon projected)
//! valuation applied to every sampled scenario. Each family model returns
//! a [`ScenarioValuation`] carrying both the total equity value and the
//! per-share figure, so the two metrics can never be conflated downstream.

mod bank;
mod reit;
mod saas;

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::model::{FamilyParams, ModelFamily, ValuationParams};
use crate::sampler::ScenarioSample;

/// Scenario variable names the models understand.
///
/// A request distribution keyed by one of these overrides the resolved
/// parameter of the same meaning per iteration. Unknown names are drawn
/// but ignored by every model.
pub mod vars {
    pub const GROWTH_RATE: &str = "growth_rate";
    pub const DISCOUNT_RATE: &str = "discount_rate";
    pub const EQUITY_RISK_PREMIUM: &str = "equity_risk_premium";
    pub const RWA_INTENSITY: &str = "rwa_intensity";
    pub const TERMINAL_GROWTH: &str = "terminal_growth";
    pub const MAINTENANCE_CAPEX_RATIO: &str = "maintenance_capex_ratio";
}

/// Gordon denominators closer to zero than this are rejected rather
/// than divided by.
const MIN_TERMINAL_SPREAD: f64 = 1e-9;

fn default_projection_years() -> usize {
    10
}

fn default_terminal_growth() -> f64 {
    0.025
}

/// The valuation applied to each scenario, selected per model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ValuationModel {
    /// Excess-capital dividend discount model driven off risk-weighted
    /// assets.
    BankDdm {
        #[serde(default = "default_projection_years")]
        projection_years: usize,
        #[serde(default = "default_terminal_growth")]
        terminal_growth: f64,
    },
    /// Gordon capitalization of adjusted funds from operations.
    ReitFfoAffo,
    /// Projected free-cash-flow DCF with a Gordon terminal value.
    SaasDcf {
        #[serde(default = "default_projection_years")]
        projection_years: usize,
        #[serde(default = "default_terminal_growth")]
        terminal_growth: f64,
    },
}

/// One scenario's valuation. Total equity value and the per-share figure
/// always travel together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioValuation {
    pub equity_value: f64,
    pub per_share_value: f64,
}

impl ValuationModel {
    /// The family this model prices.
    #[must_use]
    pub fn family(&self) -> ModelFamily {
        match self {
            ValuationModel::BankDdm { .. } => ModelFamily::Bank,
            ValuationModel::ReitFfoAffo => ModelFamily::Reit,
            ValuationModel::SaasDcf { .. } => ModelFamily::Saas,
        }
    }

    /// Default model for a family, with standard projection settings.
    #[must_use]
    pub fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Bank => ValuationModel::BankDdm {
                projection_years: default_projection_years(),
                terminal_growth: default_terminal_growth(),
            },
            ModelFamily::Reit => ValuationModel::ReitFfoAffo,
            ModelFamily::Saas => ValuationModel::SaasDcf {
                projection_years: default_projection_years(),
                terminal_growth: default_terminal_growth(),
            },
        }
    }

    /// Price one scenario. Fails fast if the resolved parameters belong
    /// to a different family than this model.
    pub fn evaluate(
        &self,
        params: &ValuationParams,
        scenario: &ScenarioSample<'_>,
    ) -> Result<ScenarioValuation, ScenarioError> {
        match (self, &params.family) {
            (
                ValuationModel::BankDdm {
                    projection_years,
                    terminal_growth,
                },
                FamilyParams::Bank(bank),
            ) => bank::evaluate(params, bank, scenario, *projection_years, *terminal_growth),
            (ValuationModel::ReitFfoAffo, FamilyParams::Reit(reit)) => {
                reit::evaluate(params, reit, scenario)
            }
            (
                ValuationModel::SaasDcf {
                    projection_years,
                    terminal_growth,
                },
                FamilyParams::Saas(saas),
            ) => saas::evaluate(params, saas, scenario, *projection_years, *terminal_growth),
            _ => Err(ScenarioError::WrongFamily {
                expected: self.family(),
            }),
        }
    }
}

/// Scenario override for the discount rate, else the configured strategy
/// applied to the resolved inputs. An `equity_risk_premium` draw feeds
/// through CAPM; a `discount_rate` draw wins outright.
fn cost_of_equity(
    params: &ValuationParams,
    scenario: &ScenarioSample<'_>,
) -> Result<f64, ScenarioError> {
    let rate = match scenario.get(vars::DISCOUNT_RATE) {
        Some(rate) => rate,
        None => params.cost_of_equity.rate_with(
            params.risk_free_rate.value,
            params.beta.value,
            scenario.get(vars::EQUITY_RISK_PREMIUM),
        ),
    };
    if !rate.is_finite() {
        return Err(ScenarioError::NonFinite {
            what: "cost of equity",
        });
    }
    if rate <= -1.0 {
        return Err(ScenarioError::OutOfDomain {
            what: "cost of equity",
            value: rate,
        });
    }
    Ok(rate)
}

fn growth_rate(
    params: &ValuationParams,
    scenario: &ScenarioSample<'_>,
) -> Result<f64, ScenarioError> {
    let growth = scenario.value_or(vars::GROWTH_RATE, params.blended_growth.value);
    if !growth.is_finite() {
        return Err(ScenarioError::NonFinite {
            what: "growth rate",
        });
    }
    if growth <= -1.0 {
        return Err(ScenarioError::OutOfDomain {
            what: "growth rate",
            value: growth,
        });
    }
    Ok(growth)
}

fn terminal_spread(coe: f64, terminal_growth: f64) -> Result<f64, ScenarioError> {
    let spread = coe - terminal_growth;
    if spread < MIN_TERMINAL_SPREAD {
        return Err(ScenarioError::DegenerateDenominator {
            what: "cost of equity minus terminal growth",
            value: spread,
        });
    }
    Ok(spread)
}

fn finalize(equity_value: f64, shares: f64) -> Result<ScenarioValuation, ScenarioError> {
    if !equity_value.is_finite() {
        return Err(ScenarioError::NonFinite {
            what: "equity value",
        });
    }
    let per_share_value = equity_value / shares;
    if !per_share_value.is_finite() {
        return Err(ScenarioError::NonFinite {
            what: "per-share value",
        });
    }
    Ok(ScenarioValuation {
        equity_value,
        per_share_value,
    })
}
