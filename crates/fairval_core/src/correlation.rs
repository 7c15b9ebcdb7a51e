//! PSD validation, repair, and factorization of correlation groups.
//!
//! Estimated correlation matrices are routinely indefinite. Before any
//! correlated draw happens, every group passes through here: structural
//! validation (delegated to [`CorrelationGroup::validate_shape`]), an
//! eigenvalue check, policy-driven repair, and a PSD-tolerant Cholesky
//! factorization whose lower factor the sampler consumes.

use nalgebra::{DMatrix, SymmetricEigen};
use rustc_hash::FxHashMap;

use crate::error::CorrelationError;
use crate::model::{CorrelationGroup, Distribution, RepairConfig, RepairPolicy};

/// One group after validation, repair, and factorization.
#[derive(Debug, Clone)]
pub struct RepairedGroup {
    pub name: String,
    pub variables: Vec<String>,
    /// Lower Cholesky factor of the repaired matrix.
    pub lower: DMatrix<f64>,
    pub repaired: bool,
    pub min_eigen_before: f64,
    pub min_eigen_after: f64,
}

/// Repair diagnostics aggregated across all groups of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairReport {
    pub repaired_groups: Vec<String>,
    pub policy: RepairPolicy,
    /// Smallest eigenvalue seen across groups; `None` when the run has no
    /// non-empty groups.
    pub min_eigen_before: Option<f64>,
    pub min_eigen_after: Option<f64>,
}

impl RepairReport {
    #[must_use]
    pub fn empty(policy: RepairPolicy) -> Self {
        Self {
            repaired_groups: Vec::new(),
            policy,
            min_eigen_before: None,
            min_eigen_after: None,
        }
    }

    #[must_use]
    pub fn any_repaired(&self) -> bool {
        !self.repaired_groups.is_empty()
    }
}

/// Cross-group validation: shapes, every variable resolvable to a known
/// distribution, and no variable claimed by two groups.
pub fn validate_groups(
    groups: &[CorrelationGroup],
    distributions: &FxHashMap<String, Distribution>,
) -> Result<(), CorrelationError> {
    let mut claimed: FxHashMap<&str, &str> = FxHashMap::default();
    for group in groups {
        group.validate_shape()?;
        for variable in &group.variables {
            if !distributions.contains_key(variable) {
                return Err(CorrelationError::UnknownVariable {
                    group: group.name.clone(),
                    variable: variable.clone(),
                });
            }
            if claimed
                .insert(variable.as_str(), group.name.as_str())
                .is_some()
            {
                return Err(CorrelationError::DuplicateVariable {
                    group: group.name.clone(),
                    variable: variable.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Validate, repair if necessary, and factor every group.
pub fn prepare_groups(
    groups: &[CorrelationGroup],
    config: &RepairConfig,
) -> Result<(Vec<RepairedGroup>, RepairReport), CorrelationError> {
    let mut prepared = Vec::with_capacity(groups.len());
    let mut report = RepairReport::empty(config.policy);

    for group in groups {
        let outcome = prepare_group(group, config)?;
        if group.dim() > 0 {
            report.min_eigen_before = Some(
                report
                    .min_eigen_before
                    .map_or(outcome.min_eigen_before, |m| m.min(outcome.min_eigen_before)),
            );
            report.min_eigen_after = Some(
                report
                    .min_eigen_after
                    .map_or(outcome.min_eigen_after, |m| m.min(outcome.min_eigen_after)),
            );
        }
        if outcome.repaired {
            report.repaired_groups.push(outcome.name.clone());
        }
        prepared.push(outcome);
    }

    Ok((prepared, report))
}

/// Validate, repair, and factor a single group under the configured policy.
pub fn prepare_group(
    group: &CorrelationGroup,
    config: &RepairConfig,
) -> Result<RepairedGroup, CorrelationError> {
    group.validate_shape()?;
    let matrix = to_matrix(group);
    let min_before = min_eigenvalue(&matrix);

    let (repaired_matrix, repaired) = if min_before >= -config.psd_tolerance {
        (matrix, false)
    } else {
        let fixed = match config.policy {
            RepairPolicy::Error => {
                return Err(CorrelationError::NotPositiveSemiDefinite {
                    group: group.name.clone(),
                    min_eigenvalue: min_before,
                });
            }
            RepairPolicy::Clip => clip_eigenvalues(&matrix, config.eigen_floor),
            RepairPolicy::Higham => {
                let projected =
                    nearest_correlation(&matrix, config).map_err(|iterations| {
                        CorrelationError::RepairDidNotConverge {
                            group: group.name.clone(),
                            iterations,
                        }
                    })?;
                // The loop ends on the unit-diagonal projection, which can
                // leave a slightly negative eigenvalue.
                if min_eigenvalue(&projected) < -config.psd_tolerance {
                    clip_eigenvalues(&projected, config.eigen_floor)
                } else {
                    projected
                }
            }
        };
        (fixed, true)
    };

    let min_after = min_eigenvalue(&repaired_matrix);
    let lower = cholesky_lower_psd(&repaired_matrix, config.psd_tolerance).ok_or_else(|| {
        CorrelationError::FactorizationFailed {
            group: group.name.clone(),
        }
    })?;

    Ok(RepairedGroup {
        name: group.name.clone(),
        variables: group.variables.clone(),
        lower,
        repaired,
        min_eigen_before: min_before,
        min_eigen_after: min_after,
    })
}

fn to_matrix(group: &CorrelationGroup) -> DMatrix<f64> {
    let n = group.dim();
    DMatrix::from_fn(n, n, |i, j| group.matrix[i][j])
}

fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()).scale(0.5)
}

fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    if matrix.nrows() == 0 {
        return f64::INFINITY;
    }
    SymmetricEigen::new(symmetrize(matrix))
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Eigenvalue clipping: floor the spectrum at `floor`, reconstruct, and
/// renormalize back to a unit diagonal.
fn clip_eigenvalues(matrix: &DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(symmetrize(matrix));
    let floored = eigen.eigenvalues.map(|l| l.max(floor));
    let rebuilt =
        &eigen.eigenvectors * DMatrix::from_diagonal(&floored) * eigen.eigenvectors.transpose();
    renormalize_diagonal(&rebuilt)
}

/// Scale to `R[i][j] / sqrt(R[i][i] * R[j][j])`. Flooring the spectrum at
/// a positive epsilon keeps every diagonal entry strictly positive, so
/// the scale factors are always defined.
fn renormalize_diagonal(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    let scale: Vec<f64> = (0..n).map(|i| 1.0 / matrix[(i, i)].sqrt()).collect();
    let mut out = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let v = 0.5 * (matrix[(i, j)] + matrix[(j, i)]) * scale[i] * scale[j];
            out[(i, j)] = v;
            out[(j, i)] = v;
        }
        out[(i, i)] = 1.0;
    }
    out
}

/// Higham (2002) alternating projections toward the nearest correlation
/// matrix in Frobenius norm. `Err` carries the exhausted iteration budget.
fn nearest_correlation(
    matrix: &DMatrix<f64>,
    config: &RepairConfig,
) -> Result<DMatrix<f64>, usize> {
    let n = matrix.nrows();
    let mut y = symmetrize(matrix);
    let mut correction = DMatrix::zeros(n, n);

    for _ in 0..config.higham_max_iterations {
        let r = &y - &correction;
        let x = project_psd(&r);
        correction = &x - &r;
        let mut next = x;
        for i in 0..n {
            next[(i, i)] = 1.0;
        }
        let step = (&next - &y).norm();
        y = next;
        if step <= config.higham_tolerance * y.norm().max(1.0) {
            return Ok(y);
        }
    }

    Err(config.higham_max_iterations)
}

fn project_psd(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(symmetrize(matrix));
    let clipped = eigen.eigenvalues.map(|l| l.max(0.0));
    &eigen.eigenvectors * DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose()
}

/// Lower Cholesky factor tolerating zero eigenvalues. A pivot within
/// `tolerance` of zero marks a linearly dependent column, which is filled
/// with zeros; a pivot below `-tolerance` means the matrix is not PSD.
fn cholesky_lower_psd(matrix: &DMatrix<f64>, tolerance: f64) -> Option<DMatrix<f64>> {
    let n = matrix.nrows();
    let mut lower = DMatrix::zeros(n, n);

    for j in 0..n {
        let mut diag = matrix[(j, j)];
        for k in 0..j {
            diag -= lower[(j, k)] * lower[(j, k)];
        }
        if diag < -tolerance {
            return None;
        }
        if diag <= tolerance {
            continue;
        }
        let pivot = diag.sqrt();
        lower[(j, j)] = pivot;
        for i in (j + 1)..n {
            let mut sum = matrix[(i, j)];
            for k in 0..j {
                sum -= lower[(i, k)] * lower[(j, k)];
            }
            lower[(i, j)] = sum / pivot;
        }
    }

    Some(lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Indefinite by construction: pairwise correlations of 0.95, 0.95,
    /// and -0.95 cannot coexist.
    fn indefinite_group() -> CorrelationGroup {
        CorrelationGroup::new(
            "stress",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                vec![1.0, 0.95, 0.95],
                vec![0.95, 1.0, -0.95],
                vec![0.95, -0.95, 1.0],
            ],
        )
    }

    fn distributions_for(names: &[&str]) -> FxHashMap<String, Distribution> {
        names
            .iter()
            .map(|n| (n.to_string(), Distribution::normal(0.0, 1.0)))
            .collect()
    }

    #[test]
    fn psd_matrix_passes_without_repair() {
        let group = CorrelationGroup::new(
            "rates",
            vec!["x".to_string(), "y".to_string()],
            vec![vec![1.0, -0.4], vec![-0.4, 1.0]],
        );
        let outcome = prepare_group(&group, &RepairConfig::default()).unwrap();
        assert!(!outcome.repaired);
        assert!(outcome.min_eigen_before > 0.0);
        assert_eq!(outcome.min_eigen_before, outcome.min_eigen_after);
    }

    #[test]
    fn clip_repairs_indefinite_matrix() {
        let config = RepairConfig::default();
        let outcome = prepare_group(&indefinite_group(), &config).unwrap();
        assert!(outcome.repaired);
        assert!(
            outcome.min_eigen_before < 0.0,
            "expected a negative eigenvalue, got {}",
            outcome.min_eigen_before
        );
        assert!(
            outcome.min_eigen_after >= -config.psd_tolerance,
            "repair left min eigenvalue at {}",
            outcome.min_eigen_after
        );
    }

    #[test]
    fn clip_factor_reconstructs_repaired_matrix() {
        let config = RepairConfig::default();
        let outcome = prepare_group(&indefinite_group(), &config).unwrap();
        let rebuilt = &outcome.lower * outcome.lower.transpose();

        for i in 0..3 {
            assert!(
                (rebuilt[(i, i)] - 1.0).abs() < 1e-6,
                "diagonal {i} is {}",
                rebuilt[(i, i)]
            );
            for j in 0..3 {
                assert!(
                    rebuilt[(i, j)].abs() <= 1.0 + 1e-6,
                    "entry ({i},{j}) = {} escaped [-1, 1]",
                    rebuilt[(i, j)]
                );
            }
        }
    }

    #[test]
    fn higham_repairs_indefinite_matrix() {
        let config = RepairConfig {
            policy: RepairPolicy::Higham,
            ..RepairConfig::default()
        };
        let outcome = prepare_group(&indefinite_group(), &config).unwrap();
        assert!(outcome.repaired);
        assert!(outcome.min_eigen_after >= -config.psd_tolerance);

        let rebuilt = &outcome.lower * outcome.lower.transpose();
        for i in 0..3 {
            assert!((rebuilt[(i, i)] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn higham_with_tiny_budget_reports_non_convergence() {
        let config = RepairConfig {
            policy: RepairPolicy::Higham,
            higham_max_iterations: 1,
            ..RepairConfig::default()
        };
        let err = prepare_group(&indefinite_group(), &config).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::RepairDidNotConverge { iterations: 1, .. }
        ));
    }

    #[test]
    fn error_policy_rejects_indefinite_matrix() {
        let config = RepairConfig {
            policy: RepairPolicy::Error,
            ..RepairConfig::default()
        };
        let err = prepare_group(&indefinite_group(), &config).unwrap_err();
        match err {
            CorrelationError::NotPositiveSemiDefinite {
                group,
                min_eigenvalue,
            } => {
                assert_eq!(group, "stress");
                assert!(min_eigenvalue < 0.0);
            }
            other => panic!("expected NotPositiveSemiDefinite, got {other:?}"),
        }
    }

    #[test]
    fn perfectly_correlated_pair_factors_with_zero_column() {
        let group = CorrelationGroup::new(
            "degenerate",
            vec!["x".to_string(), "y".to_string()],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        );
        let outcome = prepare_group(&group, &RepairConfig::default()).unwrap();
        assert!(!outcome.repaired);
        assert_eq!(outcome.lower[(1, 1)], 0.0);
        let rebuilt = &outcome.lower * outcome.lower.transpose();
        assert!((rebuilt[(0, 1)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn validate_groups_rejects_unknown_variable() {
        let groups = vec![CorrelationGroup::new(
            "rates",
            vec!["known".to_string(), "mystery".to_string()],
            vec![vec![1.0, 0.2], vec![0.2, 1.0]],
        )];
        let err = validate_groups(&groups, &distributions_for(&["known"])).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::UnknownVariable { ref variable, .. } if variable == "mystery"
        ));
    }

    #[test]
    fn validate_groups_rejects_variable_in_two_groups() {
        let matrix = vec![vec![1.0, 0.1], vec![0.1, 1.0]];
        let groups = vec![
            CorrelationGroup::new(
                "first",
                vec!["a".to_string(), "b".to_string()],
                matrix.clone(),
            ),
            CorrelationGroup::new("second", vec!["b".to_string(), "c".to_string()], matrix),
        ];
        let err = validate_groups(&groups, &distributions_for(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::DuplicateVariable { ref group, ref variable }
                if group == "second" && variable == "b"
        ));
    }

    #[test]
    fn report_aggregates_across_groups() {
        let clean = CorrelationGroup::new(
            "clean",
            vec!["x".to_string(), "y".to_string()],
            vec![vec![1.0, 0.3], vec![0.3, 1.0]],
        );
        let (prepared, report) =
            prepare_groups(&[clean, indefinite_group()], &RepairConfig::default()).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(report.repaired_groups, vec!["stress".to_string()]);
        assert!(report.any_repaired());
        assert!(report.min_eigen_before.unwrap() < 0.0);
        assert!(report.min_eigen_after.unwrap() >= -RepairConfig::default().psd_tolerance);
        assert_eq!(report.policy, RepairPolicy::Clip);
    }
}
