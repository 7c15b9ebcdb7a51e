//! Fluent assembly of a [`ValuationRequest`].
//!
//! # Example
//!
//! ```ignore
//! use fairval_core::config::ValuationRequestBuilder;
//! use fairval_core::model::{Distribution, ModelFamily};
//! use fairval_core::valuation::vars;
//!
//! let request = ValuationRequestBuilder::new(ModelFamily::Bank)
//!     .market(market_snapshot)
//!     .fundamentals(fundamentals_snapshot)
//!     .distribution(vars::GROWTH_RATE, Distribution::normal(0.05, 0.015))
//!     .distribution(vars::RWA_INTENSITY, Distribution::normal(0.018, 0.003))
//!     .correlation_group(rates_group)
//!     .iterations(20_000)
//!     .seed(42)
//!     .build()?;
//! ```

use rustc_hash::FxHashMap;

use super::{MonteCarloConfig, ResolverConfig, ValuationRequest};
use crate::error::ValidationError;
use crate::model::{
    CorrelationGroup, CostOfEquity, Distribution, FundamentalsSnapshot, MarketSnapshot,
    ModelFamily, RepairPolicy,
};
use crate::valuation::ValuationModel;

pub struct ValuationRequestBuilder {
    family: ModelFamily,
    market: Option<MarketSnapshot>,
    fundamentals: Option<FundamentalsSnapshot>,
    model: Option<ValuationModel>,
    distributions: FxHashMap<String, Distribution>,
    correlation_groups: Vec<CorrelationGroup>,
    resolver: ResolverConfig,
    monte_carlo: MonteCarloConfig,
}

impl ValuationRequestBuilder {
    #[must_use]
    pub fn new(family: ModelFamily) -> Self {
        Self {
            family,
            market: None,
            fundamentals: None,
            model: None,
            distributions: FxHashMap::default(),
            correlation_groups: Vec::new(),
            resolver: ResolverConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
        }
    }

    #[must_use]
    pub fn market(mut self, snapshot: MarketSnapshot) -> Self {
        self.market = Some(snapshot);
        self
    }

    #[must_use]
    pub fn fundamentals(mut self, snapshot: FundamentalsSnapshot) -> Self {
        self.fundamentals = Some(snapshot);
        self
    }

    /// Replace the family-default model settings.
    #[must_use]
    pub fn model(mut self, model: ValuationModel) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn distribution(mut self, variable: impl Into<String>, dist: Distribution) -> Self {
        self.distributions.insert(variable.into(), dist);
        self
    }

    #[must_use]
    pub fn correlation_group(mut self, group: CorrelationGroup) -> Self {
        self.correlation_groups.push(group);
        self
    }

    #[must_use]
    pub fn resolver(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }

    #[must_use]
    pub fn monte_carlo(mut self, config: MonteCarloConfig) -> Self {
        self.monte_carlo = config;
        self
    }

    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.monte_carlo.iterations = iterations;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.monte_carlo.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.monte_carlo.repair.policy = policy;
        self
    }

    #[must_use]
    pub fn maintenance_capex_ratio(mut self, ratio: f64) -> Self {
        self.resolver.maintenance_capex_ratio = Some(ratio);
        self
    }

    /// Pin the cost-of-equity strategy instead of the CAPM default.
    #[must_use]
    pub fn cost_of_equity(mut self, strategy: CostOfEquity) -> Self {
        self.resolver.cost_of_equity = Some(strategy);
        self
    }

    /// Assemble the request. Both snapshots are required; everything else
    /// has usable defaults.
    pub fn build(self) -> Result<ValuationRequest, ValidationError> {
        let market = self.market.ok_or(ValidationError::MissingField {
            field: "market snapshot",
        })?;
        let fundamentals = self.fundamentals.ok_or(ValidationError::MissingField {
            field: "fundamentals snapshot",
        })?;

        Ok(ValuationRequest {
            market,
            fundamentals,
            family: self.family,
            model: self.model,
            distributions: self.distributions,
            correlation_groups: self.correlation_groups,
            resolver: self.resolver,
            monte_carlo: self.monte_carlo,
        })
    }
}
