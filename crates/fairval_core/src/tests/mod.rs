//! Integration tests for the valuation engine
//!
//! Tests are organized by topic:
//! - `resolver` - Fail-closed parameter resolution, guardrails, provenance
//! - `valuation_models` - Per-family model arithmetic through the full pipeline
//! - `correlation_repair` - PSD repair policies and their diagnostics
//! - `determinism` - Seeded reproducibility, convergence, exclusions
//! - `payload` - Wire shape of requests and result payloads

mod determinism;
