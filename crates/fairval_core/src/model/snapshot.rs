//! Raw input snapshots handed over by external data collaborators.
//!
//! The ingestion and market-data layers live outside this crate; these
//! types are the contract at that boundary. Field absence is explicit
//! (`Option`) and reported through [`MarketSnapshot::missing_fields`], so
//! the resolver can fail closed instead of guessing.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Point-in-time market data for one security.
///
/// There is deliberately no market-cap field: reconstructing shares as
/// `market_cap / price` mixes incompatible time bases and diluted-share
/// conventions, so the type makes that path impossible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub provider: String,
    pub as_of: Date,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
    #[serde(default)]
    pub consensus_growth_rate: Option<f64>,
    #[serde(default)]
    pub target_mean_price: Option<f64>,
}

impl MarketSnapshot {
    #[must_use]
    pub fn new(provider: impl Into<String>, as_of: Date) -> Self {
        Self {
            provider: provider.into(),
            as_of,
            current_price: None,
            shares_outstanding: None,
            beta: None,
            risk_free_rate: None,
            consensus_growth_rate: None,
            target_mean_price: None,
        }
    }

    /// Names of the fields the provider did not deliver, in declaration
    /// order. Echoed into the result payload's freshness block.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.current_price.is_none() {
            missing.push("current_price".to_string());
        }
        if self.shares_outstanding.is_none() {
            missing.push("shares_outstanding".to_string());
        }
        if self.beta.is_none() {
            missing.push("beta".to_string());
        }
        if self.risk_free_rate.is_none() {
            missing.push("risk_free_rate".to_string());
        }
        if self.consensus_growth_rate.is_none() {
            missing.push("consensus_growth_rate".to_string());
        }
        if self.target_mean_price.is_none() {
            missing.push("target_mean_price".to_string());
        }
        missing
    }
}

/// Latest-filing fundamentals plus the history the models need.
///
/// Histories run oldest to newest. Family sections are optional; the
/// resolver requires the section matching the requested model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub period_end_date: Date,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    /// Revenue (or equivalent top-line driver) history for trailing CAGR.
    #[serde(default)]
    pub revenue_history: Vec<f64>,
    #[serde(default)]
    pub bank: Option<BankFundamentals>,
    #[serde(default)]
    pub reit: Option<ReitFundamentals>,
    #[serde(default)]
    pub saas: Option<SaasFundamentals>,
}

impl FundamentalsSnapshot {
    #[must_use]
    pub fn new(period_end_date: Date) -> Self {
        Self {
            period_end_date,
            shares_outstanding: None,
            revenue_history: Vec::new(),
            bank: None,
            reit: None,
            saas: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankFundamentals {
    /// Most recent reported tier-1 capital.
    pub tier1_capital: f64,
    /// Management's disclosed capital target as a ratio of RWA.
    pub tier1_target_ratio: f64,
    /// Risk-weighted assets, oldest to newest; last entry is the latest.
    pub risk_weighted_assets_history: Vec<f64>,
    /// Net income aligned with the RWA history.
    pub net_income_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReitFundamentals {
    pub funds_from_operations: f64,
    pub depreciation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasFundamentals {
    pub free_cash_flow: f64,
}
