//! Sampleable random-variable specifications for scenario inputs.

use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::math::{standard_normal_cdf, standard_normal_inv_cdf};

/// Shape family and parameters of one uncertain input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionKind {
    Normal {
        mean: f64,
        std_dev: f64,
    },
    Triangular {
        min: f64,
        mode: f64,
        max: f64,
    },
    Uniform {
        min: f64,
        max: f64,
    },
}

/// A marginal distribution plus optional hard truncation bounds.
///
/// Bounds, when present, must contain the distribution's central value
/// (mean for normal, mode for triangular, midpoint for uniform); draws
/// landing outside are clamped to the bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(flatten)]
    pub kind: DistributionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bound: Option<f64>,
}

impl Distribution {
    #[must_use]
    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self {
            kind: DistributionKind::Normal { mean, std_dev },
            min_bound: None,
            max_bound: None,
        }
    }

    #[must_use]
    pub fn triangular(min: f64, mode: f64, max: f64) -> Self {
        Self {
            kind: DistributionKind::Triangular { min, mode, max },
            min_bound: None,
            max_bound: None,
        }
    }

    #[must_use]
    pub fn uniform(min: f64, max: f64) -> Self {
        Self {
            kind: DistributionKind::Uniform { min, max },
            min_bound: None,
            max_bound: None,
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, min_bound: f64, max_bound: f64) -> Self {
        self.min_bound = Some(min_bound);
        self.max_bound = Some(max_bound);
        self
    }

    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            DistributionKind::Normal { .. } => "normal",
            DistributionKind::Triangular { .. } => "triangular",
            DistributionKind::Uniform { .. } => "uniform",
        }
    }

    /// Central value: mean, mode, or midpoint depending on kind.
    #[must_use]
    pub fn central(&self) -> f64 {
        match self.kind {
            DistributionKind::Normal { mean, .. } => mean,
            DistributionKind::Triangular { mode, .. } => mode,
            DistributionKind::Uniform { min, max } => 0.5 * (min + max),
        }
    }

    /// Check parameters and bounds, returning the failure reason.
    ///
    /// Callers that know the variable name wrap the reason into
    /// [`ValidationError::InvalidDistribution`].
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.kind {
            DistributionKind::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err("mean must be finite");
                }
                if !std_dev.is_finite() || std_dev <= 0.0 {
                    return Err("std_dev must be positive and finite");
                }
            }
            DistributionKind::Triangular { min, mode, max } => {
                if !(min.is_finite() && mode.is_finite() && max.is_finite()) {
                    return Err("triangular parameters must be finite");
                }
                if min >= max {
                    return Err("triangular min must be below max");
                }
                if mode < min || mode > max {
                    return Err("triangular mode must lie within [min, max]");
                }
            }
            DistributionKind::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err("uniform parameters must be finite");
                }
                if min >= max {
                    return Err("uniform min must be below max");
                }
            }
        }

        if let Some(lo) = self.min_bound
            && !lo.is_finite()
        {
            return Err("min_bound must be finite");
        }
        if let Some(hi) = self.max_bound
            && !hi.is_finite()
        {
            return Err("max_bound must be finite");
        }
        if let (Some(lo), Some(hi)) = (self.min_bound, self.max_bound)
            && lo >= hi
        {
            return Err("min_bound must be below max_bound");
        }

        let central = self.central();
        if let Some(lo) = self.min_bound
            && central < lo
        {
            return Err("bounds must contain the distribution's central value");
        }
        if let Some(hi) = self.max_bound
            && central > hi
        {
            return Err("bounds must contain the distribution's central value");
        }

        Ok(())
    }

    /// Clamp a drawn value to the truncation bounds.
    #[must_use]
    pub fn truncate(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(lo) = self.min_bound {
            v = v.max(lo);
        }
        if let Some(hi) = self.max_bound {
            v = v.min(hi);
        }
        v
    }

    /// Quantile function (inverse CDF) of the untruncated marginal.
    ///
    /// `p` is a fraction in [0, 1]; truncation is applied separately so
    /// the correlated-sampling path can compose the two.
    #[must_use]
    pub fn quantile(&self, p: f64) -> f64 {
        match self.kind {
            DistributionKind::Normal { mean, std_dev } => {
                mean + std_dev * standard_normal_inv_cdf(p)
            }
            DistributionKind::Triangular { min, mode, max } => {
                let p = p.clamp(0.0, 1.0);
                let span = max - min;
                let cut = (mode - min) / span;
                if p <= cut {
                    min + (p * span * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - p) * span * (max - mode)).sqrt()
                }
            }
            DistributionKind::Uniform { min, max } => {
                let p = p.clamp(0.0, 1.0);
                min + p * (max - min)
            }
        }
    }

    /// Map a correlated standard-normal draw to this marginal and apply
    /// truncation. Normal marginals use the direct affine map (exact);
    /// other kinds go through the probability transform.
    #[must_use]
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        let value = match self.kind {
            DistributionKind::Normal { mean, std_dev } => mean + std_dev * z,
            _ => self.quantile(standard_normal_cdf(z)),
        };
        self.truncate(value)
    }

    /// Draw one independent (uncorrelated) sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, ValidationError> {
        let raw = match self.kind {
            DistributionKind::Normal { mean, std_dev } => rand_distr::Normal::new(mean, std_dev)
                .map(|d| d.sample(rng))
                .map_err(|_| ValidationError::InvalidDistribution {
                    variable: self.kind_label().to_string(),
                    reason: "std_dev must be positive and finite",
                })?,
            DistributionKind::Triangular { min, mode, max } => {
                rand_distr::Triangular::new(min, max, mode)
                    .map(|d| d.sample(rng))
                    .map_err(|_| ValidationError::InvalidDistribution {
                        variable: self.kind_label().to_string(),
                        reason: "triangular parameters must satisfy min <= mode <= max",
                    })?
            }
            DistributionKind::Uniform { min, max } => {
                if !(min < max) {
                    return Err(ValidationError::InvalidDistribution {
                        variable: self.kind_label().to_string(),
                        reason: "uniform min must be below max",
                    });
                }
                rng.random_range(min..max)
            }
        };
        Ok(self.truncate(raw))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn validate_rejects_bad_parameters() {
        assert!(Distribution::normal(0.05, 0.0).validate().is_err());
        assert!(Distribution::normal(0.05, -0.01).validate().is_err());
        assert!(Distribution::normal(f64::NAN, 0.01).validate().is_err());
        assert!(Distribution::triangular(0.1, 0.05, 0.2).validate().is_err());
        assert!(Distribution::triangular(0.2, 0.2, 0.1).validate().is_err());
        assert!(Distribution::uniform(0.3, 0.3).validate().is_err());
        assert!(Distribution::normal(0.05, 0.01).validate().is_ok());
        assert!(Distribution::triangular(0.0, 0.05, 0.2).validate().is_ok());
    }

    #[test]
    fn validate_requires_bounds_to_contain_central_value() {
        let d = Distribution::normal(0.10, 0.02).with_bounds(0.12, 0.20);
        assert_eq!(
            d.validate(),
            Err("bounds must contain the distribution's central value")
        );

        let d = Distribution::triangular(0.0, 0.05, 0.2).with_bounds(-0.1, 0.04);
        assert!(d.validate().is_err());

        let d = Distribution::normal(0.10, 0.02).with_bounds(0.05, 0.15);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn truncate_clamps_to_bounds() {
        let d = Distribution::normal(0.05, 0.10).with_bounds(0.0, 0.10);
        assert_eq!(d.truncate(-0.3), 0.0);
        assert_eq!(d.truncate(0.25), 0.10);
        assert_eq!(d.truncate(0.07), 0.07);
    }

    #[test]
    fn quantile_hits_known_points() {
        let n = Distribution::normal(10.0, 2.0);
        assert!((n.quantile(0.5) - 10.0).abs() < 1e-9);

        let u = Distribution::uniform(2.0, 4.0);
        assert_eq!(u.quantile(0.0), 2.0);
        assert_eq!(u.quantile(0.5), 3.0);
        assert_eq!(u.quantile(1.0), 4.0);

        let t = Distribution::triangular(0.0, 1.0, 4.0);
        assert_eq!(t.quantile(0.0), 0.0);
        assert_eq!(t.quantile(1.0), 4.0);
        // F(mode) = (1-0)/(4-0) = 0.25
        assert!((t.quantile(0.25) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quantile_is_monotone() {
        for d in [
            Distribution::normal(0.0, 1.0),
            Distribution::triangular(-1.0, 0.5, 3.0),
            Distribution::uniform(-2.0, 2.0),
        ] {
            let mut prev = f64::NEG_INFINITY;
            for i in 1..100 {
                let q = d.quantile(i as f64 / 100.0);
                assert!(q >= prev, "{} quantile not monotone at {i}", d.kind_label());
                prev = q;
            }
        }
    }

    #[test]
    fn from_standard_normal_matches_affine_map_for_normals() {
        let d = Distribution::normal(0.08, 0.02);
        assert_eq!(d.from_standard_normal(0.0), 0.08);
        assert!((d.from_standard_normal(1.0) - 0.10).abs() < 1e-12);
        assert!((d.from_standard_normal(-2.0) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn samples_respect_bounds() {
        let d = Distribution::normal(0.05, 0.50).with_bounds(-0.10, 0.20);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let v = d.sample(&mut rng).unwrap();
            assert!(
                (-0.10..=0.20).contains(&v),
                "sample {v} escaped the bounds"
            );
        }
    }

    #[test]
    fn sample_surfaces_invalid_parameters() {
        let d = Distribution::normal(0.0, -1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(d.sample(&mut rng).is_err());
    }
}
