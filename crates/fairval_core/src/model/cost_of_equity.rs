//! Pluggable cost-of-equity strategies for the bank discount rate.

use serde::{Deserialize, Serialize};

/// Discount-rate strategy for equity cash flows.
///
/// `Capm` is the default. `Fixed` carries an externally-implied cost of
/// equity computed upstream; adding a multi-factor strategy later is a
/// new variant with its own inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CostOfEquity {
    Capm { equity_risk_premium: f64 },
    Fixed { rate: f64 },
}

impl Default for CostOfEquity {
    fn default() -> Self {
        CostOfEquity::Capm {
            equity_risk_premium: 0.055,
        }
    }
}

impl CostOfEquity {
    /// Rate under the resolved inputs.
    #[must_use]
    pub fn rate(&self, risk_free_rate: f64, beta: f64) -> f64 {
        self.rate_with(risk_free_rate, beta, None)
    }

    /// Rate with a per-scenario equity-risk-premium draw. `Fixed`
    /// strategies ignore the draw; the premium is not an input there.
    #[must_use]
    pub fn rate_with(&self, risk_free_rate: f64, beta: f64, premium: Option<f64>) -> f64 {
        match self {
            CostOfEquity::Capm {
                equity_risk_premium,
            } => risk_free_rate + beta * premium.unwrap_or(*equity_risk_premium),
            CostOfEquity::Fixed { rate } => *rate,
        }
    }
}
