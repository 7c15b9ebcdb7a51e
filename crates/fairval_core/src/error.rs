use std::fmt;

use crate::model::ModelFamily;

/// Fail-closed input rejections raised during parameter resolution
/// and request validation. No simulation runs after one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingField {
        field: &'static str,
    },
    MissingFundamentals {
        family: ModelFamily,
    },
    NonPositiveShares {
        value: f64,
    },
    NonPositivePrice {
        value: f64,
    },
    TierOneTargetOutOfRange {
        value: f64,
        max: f64,
    },
    RwaIntensityOutOfRange {
        value: f64,
        max: f64,
    },
    NonPositiveCapital {
        value: f64,
    },
    NonPositiveRwa {
        value: f64,
    },
    InsufficientHistory {
        field: &'static str,
        needed: usize,
        got: usize,
    },
    InvalidDistribution {
        variable: String,
        reason: &'static str,
    },
    InvalidBlendWeights {
        reason: &'static str,
        sum: f64,
    },
    FamilyMismatch {
        expected: ModelFamily,
        got: ModelFamily,
    },
    ZeroIterations,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField { field } => {
                write!(f, "required input {field} is missing")
            }
            ValidationError::MissingFundamentals { family } => {
                write!(f, "fundamentals snapshot has no {family} section")
            }
            ValidationError::NonPositiveShares { value } => {
                write!(f, "shares outstanding must be positive, got {value}")
            }
            ValidationError::NonPositivePrice { value } => {
                write!(f, "current price must be positive, got {value}")
            }
            ValidationError::TierOneTargetOutOfRange { value, max } => {
                write!(f, "tier-1 target ratio {value} outside (0, {max}]")
            }
            ValidationError::RwaIntensityOutOfRange { value, max } => {
                write!(f, "rwa intensity {value} outside (0, {max}]")
            }
            ValidationError::NonPositiveCapital { value } => {
                write!(f, "initial capital must be positive, got {value}")
            }
            ValidationError::NonPositiveRwa { value } => {
                write!(f, "risk-weighted assets must be positive, got {value}")
            }
            ValidationError::InsufficientHistory { field, needed, got } => {
                write!(f, "{field} needs at least {needed} entries, got {got}")
            }
            ValidationError::InvalidDistribution { variable, reason } => {
                write!(f, "distribution for {variable} is invalid: {reason}")
            }
            ValidationError::InvalidBlendWeights { reason, sum } => {
                write!(f, "growth blend weights invalid (sum={sum}): {reason}")
            }
            ValidationError::FamilyMismatch { expected, got } => {
                write!(f, "valuation model expects {expected} params, got {got}")
            }
            ValidationError::ZeroIterations => {
                write!(f, "iteration count must be at least 1")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while turning raw snapshots into resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    Validation(ValidationError),
    /// Market data and filing period are too far apart under the
    /// `reject` freshness policy.
    TimeAlignmentBreach {
        gap_days: i32,
        threshold_days: i32,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Validation(e) => write!(f, "{e}"),
            ResolveError::TimeAlignmentBreach {
                gap_days,
                threshold_days,
            } => {
                write!(
                    f,
                    "market data is {gap_days} days from filing period end, threshold {threshold_days}"
                )
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for ResolveError {
    fn from(e: ValidationError) -> Self {
        ResolveError::Validation(e)
    }
}

/// Errors related to correlation-group structure and PSD repair.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationError {
    ShapeMismatch {
        group: String,
        variables: usize,
        rows: usize,
        cols: usize,
    },
    NotSymmetric {
        group: String,
        row: usize,
        col: usize,
        delta: f64,
    },
    NotUnitDiagonal {
        group: String,
        index: usize,
        value: f64,
    },
    EntryOutOfRange {
        group: String,
        row: usize,
        col: usize,
        value: f64,
    },
    UnknownVariable {
        group: String,
        variable: String,
    },
    DuplicateVariable {
        group: String,
        variable: String,
    },
    /// Matrix has a negative eigenvalue and the `error` policy forbids repair
    NotPositiveSemiDefinite {
        group: String,
        min_eigenvalue: f64,
    },
    /// Alternating projections exhausted the iteration budget
    RepairDidNotConverge {
        group: String,
        iterations: usize,
    },
    FactorizationFailed {
        group: String,
    },
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::ShapeMismatch {
                group,
                variables,
                rows,
                cols,
            } => {
                write!(
                    f,
                    "group {group}: matrix is {rows}x{cols} but lists {variables} variables"
                )
            }
            CorrelationError::NotSymmetric {
                group,
                row,
                col,
                delta,
            } => {
                write!(
                    f,
                    "group {group}: matrix asymmetric at ({row},{col}), delta {delta:e}"
                )
            }
            CorrelationError::NotUnitDiagonal {
                group,
                index,
                value,
            } => {
                write!(f, "group {group}: diagonal entry {index} is {value}, expected 1")
            }
            CorrelationError::EntryOutOfRange {
                group,
                row,
                col,
                value,
            } => {
                write!(
                    f,
                    "group {group}: correlation ({row},{col}) = {value} outside [-1, 1]"
                )
            }
            CorrelationError::UnknownVariable { group, variable } => {
                write!(f, "group {group}: variable {variable} has no distribution")
            }
            CorrelationError::DuplicateVariable { group, variable } => {
                write!(f, "variable {variable} appears more than once (group {group})")
            }
            CorrelationError::NotPositiveSemiDefinite {
                group,
                min_eigenvalue,
            } => {
                write!(
                    f,
                    "group {group}: matrix is not PSD (min eigenvalue {min_eigenvalue:e}) and repair policy is error"
                )
            }
            CorrelationError::RepairDidNotConverge { group, iterations } => {
                write!(
                    f,
                    "group {group}: nearest-correlation projection did not converge in {iterations} iterations"
                )
            }
            CorrelationError::FactorizationFailed { group } => {
                write!(f, "group {group}: Cholesky factorization failed after repair")
            }
        }
    }
}

impl std::error::Error for CorrelationError {}

/// Per-scenario arithmetic failures. These are excluded from the sample
/// set, not fatal, unless the exclusion rate crosses the safety threshold.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioError {
    NonFinite {
        what: &'static str,
    },
    DegenerateDenominator {
        what: &'static str,
        value: f64,
    },
    OutOfDomain {
        what: &'static str,
        value: f64,
    },
    WrongFamily {
        expected: ModelFamily,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::NonFinite { what } => {
                write!(f, "{what} evaluated to a non-finite value")
            }
            ScenarioError::DegenerateDenominator { what, value } => {
                write!(f, "{what} = {value:e} is too close to zero to divide by")
            }
            ScenarioError::OutOfDomain { what, value } => {
                write!(f, "{what} = {value} is outside the model domain")
            }
            ScenarioError::WrongFamily { expected } => {
                write!(f, "scenario evaluated against non-{expected} parameters")
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

/// Run-level simulation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Validation(ValidationError),
    Correlation(CorrelationError),
    /// Too many scenarios were excluded for arithmetic failures
    ExcessiveExclusions {
        excluded: usize,
        executed: usize,
        max_rate: f64,
    },
    NoValidScenarios,
    /// Run was cancelled by caller request
    Cancelled,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Validation(e) => write!(f, "{e}"),
            SimulationError::Correlation(e) => write!(f, "{e}"),
            SimulationError::ExcessiveExclusions {
                excluded,
                executed,
                max_rate,
            } => {
                write!(
                    f,
                    "{excluded} of {executed} scenarios excluded, above the {max_rate} safety threshold"
                )
            }
            SimulationError::NoValidScenarios => {
                write!(f, "no scenario produced a usable valuation")
            }
            SimulationError::Cancelled => write!(f, "simulation cancelled"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Validation(e) => Some(e),
            SimulationError::Correlation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for SimulationError {
    fn from(e: ValidationError) -> Self {
        SimulationError::Validation(e)
    }
}

impl From<CorrelationError> for SimulationError {
    fn from(e: CorrelationError) -> Self {
        SimulationError::Correlation(e)
    }
}

/// Top-level error for a full valuation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuationError {
    Resolve(ResolveError),
    Simulation(SimulationError),
}

impl fmt::Display for ValuationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuationError::Resolve(e) => write!(f, "{e}"),
            ValuationError::Simulation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ValuationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValuationError::Resolve(e) => Some(e),
            ValuationError::Simulation(e) => Some(e),
        }
    }
}

impl From<ResolveError> for ValuationError {
    fn from(e: ResolveError) -> Self {
        ValuationError::Resolve(e)
    }
}

impl From<SimulationError> for ValuationError {
    fn from(e: SimulationError) -> Self {
        ValuationError::Simulation(e)
    }
}

impl From<ValidationError> for ValuationError {
    fn from(e: ValidationError) -> Self {
        ValuationError::Resolve(ResolveError::Validation(e))
    }
}
