//! Fail-closed resolution of raw snapshots into valuation parameters.
//!
//! Resolution happens once per request, before any simulation runs. Every
//! value carries provenance, every default or fallback is recorded as an
//! assumption, and any guardrail violation aborts with a structured error
//! instead of producing a best-effort valuation.

use crate::config::{DEFAULT_MAINTENANCE_CAPEX_RATIO, FreshnessPolicy, ResolverConfig};
use crate::error::{ResolveError, ValidationError};
use crate::freshness::TimeAlignmentGuard;
use crate::growth::GrowthBlender;
use crate::model::{
    AssumptionRecord, AssumptionSeverity, BankParams, CostOfEquity, DataFreshness, FamilyParams,
    FundamentalsSnapshot, MarketDataFreshness, MarketSnapshot, ModelFamily, ParamSource,
    ReitParams, SaasParams, SourcedValue, ValuationParams,
};

/// Everything resolution produces: the parameters themselves, the audit
/// trail, and the freshness report echoed into the payload.
#[derive(Debug, Clone)]
pub struct ResolvedValuation {
    pub params: ValuationParams,
    pub assumptions: Vec<AssumptionRecord>,
    pub freshness: DataFreshness,
}

/// Turns raw snapshots into validated, provenance-tagged parameters.
pub struct ParamResolver<'a> {
    config: &'a ResolverConfig,
}

impl<'a> ParamResolver<'a> {
    #[must_use]
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        market: &MarketSnapshot,
        fundamentals: &FundamentalsSnapshot,
        family: ModelFamily,
    ) -> Result<ResolvedValuation, ResolveError> {
        let mut assumptions = Vec::new();

        let alignment = TimeAlignmentGuard::new(self.config.time_alignment)
            .evaluate(market.as_of, fundamentals.period_end_date);
        if alignment.breached {
            match alignment.policy {
                FreshnessPolicy::Reject => {
                    return Err(ResolveError::TimeAlignmentBreach {
                        gap_days: alignment.gap_days,
                        threshold_days: alignment.threshold_days,
                    });
                }
                FreshnessPolicy::Warn => {
                    tracing::warn!(
                        gap_days = alignment.gap_days,
                        threshold_days = alignment.threshold_days,
                        "Market as-of and filing period end drift beyond threshold"
                    );
                    assumptions.push(AssumptionRecord::defaulted(
                        format!(
                            "market data as-of is {} days from filing period end (threshold {} days)",
                            alignment.gap_days, alignment.threshold_days
                        ),
                        AssumptionSeverity::High,
                    ));
                }
            }
        }

        let shares_outstanding = resolve_shares(market, fundamentals, &mut assumptions)?;

        let price = market.current_price.ok_or(ValidationError::MissingField {
            field: "current_price",
        })?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::NonPositivePrice { value: price }.into());
        }
        let current_price = SourcedValue::new(price, ParamSource::MarketData, market.as_of);

        let risk_free_rate = match market.risk_free_rate {
            Some(rate) => SourcedValue::new(rate, ParamSource::MarketData, market.as_of),
            None => {
                assumptions.push(AssumptionRecord::defaulted(
                    format!(
                        "risk-free rate defaulted to {:.4}",
                        self.config.default_risk_free_rate
                    ),
                    AssumptionSeverity::Medium,
                ));
                SourcedValue::new(
                    self.config.default_risk_free_rate,
                    ParamSource::Config,
                    market.as_of,
                )
            }
        };
        let beta = match market.beta {
            Some(beta) => SourcedValue::new(beta, ParamSource::MarketData, market.as_of),
            None => {
                assumptions.push(AssumptionRecord::defaulted(
                    format!("beta defaulted to {:.2}", self.config.default_beta),
                    AssumptionSeverity::Medium,
                ));
                SourcedValue::new(self.config.default_beta, ParamSource::Config, market.as_of)
            }
        };

        let strategy = self.config.cost_of_equity.unwrap_or(CostOfEquity::Capm {
            equity_risk_premium: self.config.equity_risk_premium,
        });
        let discount_rate = SourcedValue::new(
            strategy.rate(risk_free_rate.value, beta.value),
            ParamSource::Derived,
            market.as_of,
        );

        let blend = GrowthBlender::new(&self.config.growth)
            .blend(&fundamentals.revenue_history, market.consensus_growth_rate)
            .map_err(ResolveError::Validation)?;
        let blended_growth = SourcedValue::new(blend.value, ParamSource::Blended, market.as_of);
        assumptions.extend(blend.assumptions);

        let family_params = match family {
            ModelFamily::Bank => {
                FamilyParams::Bank(self.resolve_bank(fundamentals, &mut assumptions)?)
            }
            ModelFamily::Reit => {
                FamilyParams::Reit(self.resolve_reit(fundamentals, &mut assumptions)?)
            }
            ModelFamily::Saas => {
                let saas =
                    fundamentals
                        .saas
                        .as_ref()
                        .ok_or(ValidationError::MissingFundamentals {
                            family: ModelFamily::Saas,
                        })?;
                FamilyParams::Saas(SaasParams {
                    free_cash_flow: saas.free_cash_flow,
                })
            }
        };

        let freshness = DataFreshness {
            market_data: MarketDataFreshness {
                provider: market.provider.clone(),
                as_of: market.as_of,
                missing_fields: market.missing_fields(),
            },
            time_alignment: alignment,
        };

        Ok(ResolvedValuation {
            params: ValuationParams {
                shares_outstanding,
                current_price,
                risk_free_rate,
                beta,
                discount_rate,
                blended_growth,
                cost_of_equity: strategy,
                family: family_params,
            },
            assumptions,
            freshness,
        })
    }

    fn resolve_bank(
        &self,
        fundamentals: &FundamentalsSnapshot,
        assumptions: &mut Vec<AssumptionRecord>,
    ) -> Result<BankParams, ValidationError> {
        let bank = fundamentals
            .bank
            .as_ref()
            .ok_or(ValidationError::MissingFundamentals {
                family: ModelFamily::Bank,
            })?;
        let rails = &self.config.guardrails;

        if !bank.tier1_capital.is_finite() || bank.tier1_capital <= 0.0 {
            return Err(ValidationError::NonPositiveCapital {
                value: bank.tier1_capital,
            });
        }
        if !bank.tier1_target_ratio.is_finite()
            || bank.tier1_target_ratio <= 0.0
            || bank.tier1_target_ratio > rails.max_tier1_target_ratio
        {
            return Err(ValidationError::TierOneTargetOutOfRange {
                value: bank.tier1_target_ratio,
                max: rails.max_tier1_target_ratio,
            });
        }

        let rwa_history = &bank.risk_weighted_assets_history;
        let Some(&initial_rwa) = rwa_history.last() else {
            return Err(ValidationError::InsufficientHistory {
                field: "risk_weighted_assets_history",
                needed: 1,
                got: 0,
            });
        };
        if !initial_rwa.is_finite() || initial_rwa <= 0.0 {
            return Err(ValidationError::NonPositiveRwa { value: initial_rwa });
        }
        let Some(&latest_net_income) = bank.net_income_history.last() else {
            return Err(ValidationError::InsufficientHistory {
                field: "net_income_history",
                needed: 1,
                got: 0,
            });
        };

        let mut rwa_intensity = latest_net_income / initial_rwa;

        // A latest RWA far off its historical median makes the point
        // intensity noise; the median return on RWA is the sturdier read.
        let median_rwa = median(rwa_history);
        if median_rwa > 0.0 {
            let deviation = ((initial_rwa - median_rwa) / median_rwa).abs();
            if deviation > self.config.rwa_continuity_threshold
                && let Some(fallback) =
                    median_return_on_rwa(rwa_history, &bank.net_income_history)
            {
                tracing::warn!(
                    deviation = deviation,
                    threshold = self.config.rwa_continuity_threshold,
                    point_intensity = rwa_intensity,
                    fallback = fallback,
                    "Latest RWA discontinuous with history, using median return on RWA"
                );
                assumptions.push(AssumptionRecord::defaulted(
                    format!(
                        "latest RWA deviates {:.1}% from its historical median; rwa_intensity uses the median return on RWA {fallback:.4} instead of the point value {rwa_intensity:.4}",
                        deviation * 100.0,
                    ),
                    AssumptionSeverity::High,
                ));
                rwa_intensity = fallback;
            }
        }

        if !rwa_intensity.is_finite()
            || rwa_intensity <= 0.0
            || rwa_intensity > rails.max_rwa_intensity
        {
            return Err(ValidationError::RwaIntensityOutOfRange {
                value: rwa_intensity,
                max: rails.max_rwa_intensity,
            });
        }

        Ok(BankParams {
            tier1_target_ratio: bank.tier1_target_ratio,
            rwa_intensity,
            initial_capital: bank.tier1_capital,
            initial_rwa,
        })
    }

    fn resolve_reit(
        &self,
        fundamentals: &FundamentalsSnapshot,
        assumptions: &mut Vec<AssumptionRecord>,
    ) -> Result<ReitParams, ValidationError> {
        let reit = fundamentals
            .reit
            .as_ref()
            .ok_or(ValidationError::MissingFundamentals {
                family: ModelFamily::Reit,
            })?;

        let maintenance_capex_ratio = match self.config.maintenance_capex_ratio {
            Some(ratio) => {
                assumptions.push(AssumptionRecord::overridden(
                    format!(
                        "maintenance capex ratio overridden to {ratio:.2} (stock default {DEFAULT_MAINTENANCE_CAPEX_RATIO:.2})"
                    ),
                    AssumptionSeverity::Medium,
                ));
                ratio
            }
            None => {
                assumptions.push(AssumptionRecord::defaulted(
                    format!(
                        "maintenance capex ratio defaulted to {DEFAULT_MAINTENANCE_CAPEX_RATIO:.2} of depreciation"
                    ),
                    AssumptionSeverity::Low,
                ));
                DEFAULT_MAINTENANCE_CAPEX_RATIO
            }
        };

        Ok(ReitParams {
            funds_from_operations: reit.funds_from_operations,
            depreciation: reit.depreciation,
            maintenance_capex_ratio,
        })
    }
}

fn resolve_shares(
    market: &MarketSnapshot,
    fundamentals: &FundamentalsSnapshot,
    assumptions: &mut Vec<AssumptionRecord>,
) -> Result<SourcedValue, ValidationError> {
    // Market feed wins; the latest filing is the only fallback. Shares are
    // never reconstructed from a market cap.
    let shares = if let Some(shares) = market.shares_outstanding {
        SourcedValue::new(shares, ParamSource::MarketData, market.as_of)
    } else if let Some(shares) = fundamentals.shares_outstanding {
        assumptions.push(AssumptionRecord::defaulted(
            "shares outstanding missing from market feed; using the latest filing value",
            AssumptionSeverity::Medium,
        ));
        SourcedValue::new(shares, ParamSource::Filing, fundamentals.period_end_date)
    } else {
        return Err(ValidationError::MissingField {
            field: "shares_outstanding",
        });
    };
    if !shares.value.is_finite() || shares.value <= 0.0 {
        return Err(ValidationError::NonPositiveShares {
            value: shares.value,
        });
    }
    Ok(shares)
}

fn median(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Median of per-period net-income / RWA ratios, aligned from the most
/// recent period backwards. `None` when no period has a positive RWA.
fn median_return_on_rwa(rwa: &[f64], net_income: &[f64]) -> Option<f64> {
    let len = rwa.len().min(net_income.len());
    if len == 0 {
        return None;
    }
    let ratios: Vec<f64> = rwa[rwa.len() - len..]
        .iter()
        .zip(&net_income[net_income.len() - len..])
        .filter(|&(&r, _)| r > 0.0)
        .map(|(&r, &n)| n / r)
        .collect();
    if ratios.is_empty() {
        None
    } else {
        Some(median(&ratios))
    }
}
