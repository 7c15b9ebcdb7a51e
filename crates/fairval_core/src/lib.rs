//! Correlated Monte Carlo valuation engine
//!
//! This crate resolves a per-security equity valuation as a probability
//! distribution rather than a point estimate, across heterogeneous
//! business-model families (bank, REIT, SaaS). It supports:
//! - Fail-closed parameter resolution with provenance and guardrails
//! - PSD repair of estimated correlation matrices (clip / Higham / reject)
//! - Correlated scenario sampling with deterministic per-iteration streams
//! - Pure per-scenario valuation models returning both total equity value
//!   and per-share intrinsic value
//! - Percentile aggregation with explicit metric-type tagging and
//!   convergence / exclusion / repair diagnostics
//!
//! # Builder API
//!
//! Use the fluent builder to assemble a request, then run it:
//!
//! ```ignore
//! use fairval_core::config::ValuationRequest;
//! use fairval_core::model::{Distribution, ModelFamily};
//! use fairval_core::valuation::vars;
//!
//! let request = ValuationRequest::builder(ModelFamily::Bank)
//!     .market(market_snapshot)
//!     .fundamentals(fundamentals_snapshot)
//!     .distribution(vars::GROWTH_RATE, Distribution::normal(0.05, 0.015))
//!     .correlation_group(rates_group)
//!     .iterations(20_000)
//!     .seed(42)
//!     .build()?;
//!
//! let result = fairval_core::run_valuation(&request)?;
//! assert_eq!(result.distribution_summary.metric_type.to_string(),
//!            "intrinsic_value_per_share");
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod correlation;
pub mod error;
pub mod freshness;
pub mod growth;
pub mod math;
pub mod resolve;
pub mod sampler;
pub mod simulation;
pub mod summary;
pub mod valuation;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{ValuationRequest, ValuationRequestBuilder};
pub use error::ValuationError;
pub use model::ValuationResult;
pub use simulation::{MonteCarloEngine, RunProgress, run_valuation, run_valuation_with_progress};
pub use valuation::ValuationModel;
