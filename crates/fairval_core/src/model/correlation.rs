//! Correlation-group data types and structural validation.
//!
//! Repair and factorization live in [`crate::correlation`]; this module
//! owns the wire-facing shapes and the checks that need no linear algebra.

use serde::{Deserialize, Serialize};

use crate::error::CorrelationError;

/// Tolerance for symmetry, unit-diagonal, and entry-range checks on
/// caller-supplied matrices.
pub const STRUCTURE_TOLERANCE: f64 = 1e-8;

/// What to do with a correlation matrix that is not PSD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPolicy {
    /// Fail the run.
    Error,
    /// Eigenvalue clipping: floor negative eigenvalues and renormalize.
    #[default]
    Clip,
    /// Alternating projections to the nearest correlation matrix.
    Higham,
}

/// Knobs for PSD repair. The defaults match the documented tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
    #[serde(default)]
    pub policy: RepairPolicy,
    /// Floor applied to clipped eigenvalues.
    #[serde(default = "default_eigen_floor")]
    pub eigen_floor: f64,
    /// A matrix counts as PSD when its smallest eigenvalue is above
    /// minus this tolerance.
    #[serde(default = "default_psd_tolerance")]
    pub psd_tolerance: f64,
    #[serde(default = "default_higham_max_iterations")]
    pub higham_max_iterations: usize,
    #[serde(default = "default_higham_tolerance")]
    pub higham_tolerance: f64,
}

fn default_eigen_floor() -> f64 {
    1e-8
}

fn default_psd_tolerance() -> f64 {
    1e-8
}

fn default_higham_max_iterations() -> usize {
    200
}

fn default_higham_tolerance() -> f64 {
    1e-10
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            policy: RepairPolicy::default(),
            eigen_floor: default_eigen_floor(),
            psd_tolerance: default_psd_tolerance(),
            higham_max_iterations: default_higham_max_iterations(),
            higham_tolerance: default_higham_tolerance(),
        }
    }
}

/// A named set of variables with their correlation matrix (row-major,
/// square, aligned with `variables`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub name: String,
    pub variables: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

impl CorrelationGroup {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        variables: Vec<String>,
        matrix: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            name: name.into(),
            variables,
            matrix,
        }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    /// Structural checks: square shape matching the variable list, no
    /// in-group duplicate variables, finite entries in [-1, 1], symmetry,
    /// unit diagonal. PSD is checked later, during repair.
    pub fn validate_shape(&self) -> Result<(), CorrelationError> {
        let n = self.variables.len();
        if self.matrix.len() != n || self.matrix.iter().any(|row| row.len() != n) {
            return Err(CorrelationError::ShapeMismatch {
                group: self.name.clone(),
                variables: n,
                rows: self.matrix.len(),
                cols: self.matrix.first().map_or(0, Vec::len),
            });
        }

        for (i, variable) in self.variables.iter().enumerate() {
            if self.variables[..i].contains(variable) {
                return Err(CorrelationError::DuplicateVariable {
                    group: self.name.clone(),
                    variable: variable.clone(),
                });
            }
        }

        for i in 0..n {
            for j in 0..n {
                let value = self.matrix[i][j];
                if !value.is_finite() || value.abs() > 1.0 + STRUCTURE_TOLERANCE {
                    return Err(CorrelationError::EntryOutOfRange {
                        group: self.name.clone(),
                        row: i,
                        col: j,
                        value,
                    });
                }
            }
            let diag = self.matrix[i][i];
            if (diag - 1.0).abs() > STRUCTURE_TOLERANCE {
                return Err(CorrelationError::NotUnitDiagonal {
                    group: self.name.clone(),
                    index: i,
                    value: diag,
                });
            }
            for j in (i + 1)..n {
                let delta = (self.matrix[i][j] - self.matrix[j][i]).abs();
                if delta > STRUCTURE_TOLERANCE {
                    return Err(CorrelationError::NotSymmetric {
                        group: self.name.clone(),
                        row: i,
                        col: j,
                        delta,
                    });
                }
            }
        }

        Ok(())
    }
}
