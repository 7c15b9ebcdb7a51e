//! Resolved, provenance-tagged parameters produced by the resolver.
//!
//! Everything here is immutable once constructed; the simulation loop
//! reads it without synchronization.

use std::collections::BTreeMap;
use std::fmt;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::cost_of_equity::CostOfEquity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Bank,
    Reit,
    Saas,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Bank => write!(f, "bank"),
            ModelFamily::Reit => write!(f, "reit"),
            ModelFamily::Saas => write!(f, "saas"),
        }
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    /// Live market-data feed.
    MarketData,
    /// Most recent filing.
    Filing,
    /// Computed from other resolved inputs.
    Derived,
    /// Output of the growth blender.
    Blended,
    /// Engine configuration default.
    Config,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::MarketData => write!(f, "market data"),
            ParamSource::Filing => write!(f, "filing"),
            ParamSource::Derived => write!(f, "derived"),
            ParamSource::Blended => write!(f, "blended"),
            ParamSource::Config => write!(f, "config"),
        }
    }
}

/// A resolved numeric input plus its provenance tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcedValue {
    pub value: f64,
    pub source: ParamSource,
    pub as_of: Date,
}

impl SourcedValue {
    #[must_use]
    pub fn new(value: f64, source: ParamSource, as_of: Date) -> Self {
        Self {
            value,
            source,
            as_of,
        }
    }
}

/// Bank-family parameters. All guardrails are enforced by the resolver
/// before one of these exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankParams {
    /// Target tier-1 capital as a ratio of RWA, in (0, 0.30].
    pub tier1_target_ratio: f64,
    /// Return on risk-weighted assets, in (0, 0.20].
    pub rwa_intensity: f64,
    /// Latest reported tier-1 capital, strictly positive.
    pub initial_capital: f64,
    /// Latest risk-weighted assets, the earnings driver's starting point.
    pub initial_rwa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReitParams {
    pub funds_from_operations: f64,
    pub depreciation: f64,
    /// Share of depreciation treated as maintenance capex when deriving
    /// AFFO from FFO.
    pub maintenance_capex_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasParams {
    pub free_cash_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FamilyParams {
    Bank(BankParams),
    Reit(ReitParams),
    Saas(SaasParams),
}

impl FamilyParams {
    #[must_use]
    pub fn model_family(&self) -> ModelFamily {
        match self {
            FamilyParams::Bank(_) => ModelFamily::Bank,
            FamilyParams::Reit(_) => ModelFamily::Reit,
            FamilyParams::Saas(_) => ModelFamily::Saas,
        }
    }
}

/// The full resolved parameter set for one valuation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationParams {
    pub shares_outstanding: SourcedValue,
    pub current_price: SourcedValue,
    pub risk_free_rate: SourcedValue,
    pub beta: SourcedValue,
    /// Resolved cost of equity under the configured strategy; scenario
    /// draws may override it per iteration.
    pub discount_rate: SourcedValue,
    pub blended_growth: SourcedValue,
    pub cost_of_equity: CostOfEquity,
    pub family: FamilyParams,
}

impl ValuationParams {
    #[must_use]
    pub fn model_family(&self) -> ModelFamily {
        self.family.model_family()
    }

    /// Resolved numeric inputs as a sorted map, echoed into the result
    /// payload for audit.
    #[must_use]
    pub fn key_parameters(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("shares_outstanding".to_string(), self.shares_outstanding.value);
        map.insert("current_price".to_string(), self.current_price.value);
        map.insert("risk_free_rate".to_string(), self.risk_free_rate.value);
        map.insert("beta".to_string(), self.beta.value);
        map.insert("discount_rate".to_string(), self.discount_rate.value);
        map.insert("blended_growth".to_string(), self.blended_growth.value);

        match &self.family {
            FamilyParams::Bank(bank) => {
                map.insert("tier1_target_ratio".to_string(), bank.tier1_target_ratio);
                map.insert("rwa_intensity".to_string(), bank.rwa_intensity);
                map.insert("initial_capital".to_string(), bank.initial_capital);
                map.insert("initial_rwa".to_string(), bank.initial_rwa);
            }
            FamilyParams::Reit(reit) => {
                map.insert(
                    "funds_from_operations".to_string(),
                    reit.funds_from_operations,
                );
                map.insert("depreciation".to_string(), reit.depreciation);
                map.insert(
                    "maintenance_capex_ratio".to_string(),
                    reit.maintenance_capex_ratio,
                );
            }
            FamilyParams::Saas(saas) => {
                map.insert("free_cash_flow".to_string(), saas.free_cash_flow);
            }
        }

        map
    }
}
