//! Blending of historical, consensus, and long-run growth signals.
//!
//! Every component that contributes to the blended rate is enumerated in
//! an [`AssumptionRecord`], and a missing component renormalizes the
//! remaining weights rather than silently shifting the result.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{AssumptionRecord, AssumptionSeverity};

/// Blend weights must sum to 1 within this tolerance, both as configured
/// and after renormalization.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weights and guardrails for the growth blend.
///
/// The default 30/50/20 split (historical / consensus / long-run anchor)
/// is illustrative and expected to be recalibrated per coverage universe;
/// it is configuration, not policy baked into the blender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthBlendConfig {
    /// Weight on the trailing CAGR of the driver history.
    #[serde(default = "default_historical_weight")]
    pub historical_weight: f64,
    /// Weight on the analyst consensus growth rate.
    #[serde(default = "default_consensus_weight")]
    pub consensus_weight: f64,
    /// Weight on the long-run anchor rate.
    #[serde(default = "default_anchor_weight")]
    pub anchor_weight: f64,
    /// The anchor component's value; also the fallback when every other
    /// component is missing.
    #[serde(default = "default_long_run_growth")]
    pub long_run_growth: f64,
    /// Trailing CAGR above this ceiling trips the mean-reversion pull.
    #[serde(default = "default_reversion_ceiling")]
    pub reversion_ceiling: f64,
    /// Rate the blended value is pulled toward when the ceiling trips.
    #[serde(default = "default_reversion_target")]
    pub reversion_target: f64,
    /// Pull strength in [0, 1]: 0 leaves the blend untouched, 1 snaps it
    /// to the reversion target.
    #[serde(default = "default_reversion_strength")]
    pub reversion_strength: f64,
}

fn default_historical_weight() -> f64 {
    0.3
}

fn default_consensus_weight() -> f64 {
    0.5
}

fn default_anchor_weight() -> f64 {
    0.2
}

fn default_long_run_growth() -> f64 {
    0.025
}

fn default_reversion_ceiling() -> f64 {
    0.25
}

fn default_reversion_target() -> f64 {
    0.05
}

fn default_reversion_strength() -> f64 {
    0.5
}

impl Default for GrowthBlendConfig {
    fn default() -> Self {
        Self {
            historical_weight: default_historical_weight(),
            consensus_weight: default_consensus_weight(),
            anchor_weight: default_anchor_weight(),
            long_run_growth: default_long_run_growth(),
            reversion_ceiling: default_reversion_ceiling(),
            reversion_target: default_reversion_target(),
            reversion_strength: default_reversion_strength(),
        }
    }
}

impl GrowthBlendConfig {
    /// Weights must be finite, non-negative, and sum to 1 within
    /// [`WEIGHT_SUM_TOLERANCE`]; the reversion strength must lie in [0, 1].
    pub fn validate(&self) -> Result<(), ValidationError> {
        let weights = [
            self.historical_weight,
            self.consensus_weight,
            self.anchor_weight,
        ];
        let sum: f64 = weights.iter().sum();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ValidationError::InvalidBlendWeights {
                reason: "weights must be finite and non-negative",
                sum,
            });
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ValidationError::InvalidBlendWeights {
                reason: "weights must sum to 1",
                sum,
            });
        }
        if !(0.0..=1.0).contains(&self.reversion_strength) {
            return Err(ValidationError::InvalidBlendWeights {
                reason: "reversion strength must lie in [0, 1]",
                sum,
            });
        }
        Ok(())
    }
}

/// One contributing component after renormalization. Effective weights
/// across the components of a blend always sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthComponent {
    pub name: &'static str,
    pub weight: f64,
    pub value: f64,
}

/// Outcome of a blend: the rate, the components that actually
/// contributed, and the audit records to attach to the run.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedGrowth {
    pub value: f64,
    /// Trailing CAGR of the driver history, when computable.
    pub trailing_cagr: Option<f64>,
    pub components: Vec<GrowthComponent>,
    pub reversion_applied: bool,
    pub assumptions: Vec<AssumptionRecord>,
}

/// Combines historical, consensus, and anchor growth under a
/// [`GrowthBlendConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GrowthBlender<'a> {
    config: &'a GrowthBlendConfig,
}

impl<'a> GrowthBlender<'a> {
    #[must_use]
    pub fn new(config: &'a GrowthBlendConfig) -> Self {
        Self { config }
    }

    /// Blend the available components, renormalizing weights over whatever
    /// is present and applying the mean-reversion guardrail.
    pub fn blend(
        &self,
        driver_history: &[f64],
        consensus_growth: Option<f64>,
    ) -> Result<BlendedGrowth, ValidationError> {
        self.config.validate()?;

        let trailing = trailing_cagr(driver_history);
        let mut assumptions = Vec::new();

        let mut components = Vec::with_capacity(3);
        match trailing {
            Some(cagr) => components.push(("historical_cagr", self.config.historical_weight, cagr)),
            None => assumptions.push(AssumptionRecord::defaulted(
                format!(
                    "historical growth component dropped: driver history has {} usable entries, 2 needed",
                    driver_history.len()
                ),
                AssumptionSeverity::Medium,
            )),
        }
        match consensus_growth {
            Some(g) => components.push(("consensus", self.config.consensus_weight, g)),
            None => assumptions.push(AssumptionRecord::defaulted(
                "consensus growth component dropped: no consensus rate in market data",
                AssumptionSeverity::Medium,
            )),
        }
        components.push((
            "long_run_anchor",
            self.config.anchor_weight,
            self.config.long_run_growth,
        ));

        let raw_sum: f64 = components.iter().map(|(_, w, _)| w).sum();
        let components: Vec<GrowthComponent> = if raw_sum <= WEIGHT_SUM_TOLERANCE {
            // Every weighted component is missing or zero-weighted; the
            // anchor carries the full blend.
            assumptions.push(AssumptionRecord::defaulted(
                format!(
                    "no weighted growth component available; using long-run anchor {:.4}",
                    self.config.long_run_growth
                ),
                AssumptionSeverity::High,
            ));
            vec![GrowthComponent {
                name: "long_run_anchor",
                weight: 1.0,
                value: self.config.long_run_growth,
            }]
        } else {
            components
                .into_iter()
                .map(|(name, weight, value)| GrowthComponent {
                    name,
                    weight: weight / raw_sum,
                    value,
                })
                .collect()
        };

        let mut value: f64 = components.iter().map(|c| c.weight * c.value).sum();

        let statement = components
            .iter()
            .map(|c| format!("{} {:.4} (weight {:.4})", c.name, c.value, c.weight))
            .collect::<Vec<_>>()
            .join(", ");
        assumptions.push(AssumptionRecord::blended(
            format!("blended growth {value:.4} from {statement}"),
            AssumptionSeverity::Low,
        ));

        let mut reversion_applied = false;
        if let Some(cagr) = trailing
            && cagr > self.config.reversion_ceiling
        {
            let pulled =
                value + self.config.reversion_strength * (self.config.reversion_target - value);
            tracing::warn!(
                trailing_cagr = cagr,
                ceiling = self.config.reversion_ceiling,
                blended = value,
                pulled = pulled,
                "Trailing growth above reversion ceiling, pulling blend toward target"
            );
            assumptions.push(AssumptionRecord::blended(
                format!(
                    "trailing CAGR {cagr:.4} exceeds ceiling {:.4}; blend pulled from {value:.4} to {pulled:.4} (target {:.4}, strength {:.2})",
                    self.config.reversion_ceiling,
                    self.config.reversion_target,
                    self.config.reversion_strength,
                ),
                AssumptionSeverity::High,
            ));
            value = pulled;
            reversion_applied = true;
        }

        Ok(BlendedGrowth {
            value,
            trailing_cagr: trailing,
            components,
            reversion_applied,
            assumptions,
        })
    }
}

/// Trailing compound annual growth of a history running oldest to newest.
///
/// Needs at least two entries with positive endpoints; anything else is
/// reported as "not computable" rather than an error, so the blender can
/// renormalize around it.
#[must_use]
pub fn trailing_cagr(history: &[f64]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let first = *history.first()?;
    let last = *history.last()?;
    if !(first.is_finite() && last.is_finite()) || first <= 0.0 || last <= 0.0 {
        return None;
    }
    let periods = (history.len() - 1) as f64;
    Some((last / first).powf(1.0 / periods) - 1.0)
}

#[cfg(test)]
mod tests {
    use crate::model::AssumptionCategory;

    use super::*;

    #[test]
    fn trailing_cagr_matches_known_values() {
        // 100 -> 121 over two periods is 10% per period
        let cagr = trailing_cagr(&[100.0, 110.0, 121.0]).unwrap();
        assert!((cagr - 0.10).abs() < 1e-12, "cagr was {cagr}");

        assert_eq!(trailing_cagr(&[100.0]), None);
        assert_eq!(trailing_cagr(&[]), None);
        assert_eq!(trailing_cagr(&[-5.0, 100.0]), None);
        assert_eq!(trailing_cagr(&[100.0, 0.0]), None);
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let config = GrowthBlendConfig {
            historical_weight: 0.5,
            ..GrowthBlendConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBlendWeights { .. })
        ));

        let config = GrowthBlendConfig {
            consensus_weight: -0.1,
            anchor_weight: 0.8,
            ..GrowthBlendConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(GrowthBlendConfig::default().validate().is_ok());
    }

    #[test]
    fn full_blend_uses_configured_weights() {
        let config = GrowthBlendConfig::default();
        let blended = GrowthBlender::new(&config)
            .blend(&[100.0, 110.0, 121.0], Some(0.06))
            .unwrap();

        // 0.3 * 0.10 + 0.5 * 0.06 + 0.2 * 0.025
        assert!((blended.value - 0.065).abs() < 1e-12, "blend was {}", blended.value);
        assert_eq!(blended.components.len(), 3);
        let weight_sum: f64 = blended.components.iter().map(|c| c.weight).sum();
        assert!((weight_sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(!blended.reversion_applied);
    }

    #[test]
    fn missing_components_renormalize() {
        let config = GrowthBlendConfig::default();
        let blended = GrowthBlender::new(&config).blend(&[], Some(0.06)).unwrap();

        // consensus 0.5 and anchor 0.2 renormalize to 5/7 and 2/7
        let expected = (0.5 * 0.06 + 0.2 * 0.025) / 0.7;
        assert!(
            (blended.value - expected).abs() < 1e-12,
            "blend was {}, expected {expected}",
            blended.value
        );
        let weight_sum: f64 = blended.components.iter().map(|c| c.weight).sum();
        assert!((weight_sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(
            blended
                .assumptions
                .iter()
                .any(|a| a.category == AssumptionCategory::Default),
            "dropped component must be recorded"
        );
    }

    #[test]
    fn all_components_missing_falls_back_to_anchor() {
        let config = GrowthBlendConfig {
            anchor_weight: 0.0,
            historical_weight: 0.6,
            consensus_weight: 0.4,
            ..GrowthBlendConfig::default()
        };
        let blended = GrowthBlender::new(&config).blend(&[], None).unwrap();
        assert_eq!(blended.value, config.long_run_growth);
        assert_eq!(blended.components.len(), 1);
        assert_eq!(blended.components[0].weight, 1.0);
        assert!(
            blended
                .assumptions
                .iter()
                .any(|a| a.severity == AssumptionSeverity::High)
        );
    }

    #[test]
    fn reversion_pulls_hot_growth_toward_target() {
        let config = GrowthBlendConfig {
            reversion_ceiling: 0.20,
            reversion_target: 0.05,
            reversion_strength: 0.5,
            ..GrowthBlendConfig::default()
        };
        // 100 -> 169 over two periods is 30% per period, over the ceiling
        let blended = GrowthBlender::new(&config)
            .blend(&[100.0, 130.0, 169.0], Some(0.10))
            .unwrap();

        let raw = 0.3 * 0.30 + 0.5 * 0.10 + 0.2 * 0.025;
        let expected = raw + 0.5 * (0.05 - raw);
        assert!(blended.reversion_applied);
        assert!(
            (blended.value - expected).abs() < 1e-12,
            "blend was {}, expected {expected}",
            blended.value
        );
        assert!(
            blended
                .assumptions
                .iter()
                .any(|a| a.severity == AssumptionSeverity::High)
        );
    }

    #[test]
    fn blend_record_enumerates_components() {
        let config = GrowthBlendConfig::default();
        let blended = GrowthBlender::new(&config)
            .blend(&[100.0, 110.0], Some(0.04))
            .unwrap();
        let record = blended
            .assumptions
            .iter()
            .find(|a| a.category == AssumptionCategory::Blended)
            .unwrap();
        assert!(record.statement.contains("historical_cagr"));
        assert!(record.statement.contains("consensus"));
        assert!(record.statement.contains("long_run_anchor"));
    }
}
