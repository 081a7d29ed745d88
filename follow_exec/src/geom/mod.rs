//! # Geometry module
//!
//! Closed-form geometry used by trajectory control:
//!
//! - [`poly`]: power-basis polynomials and a best-effort root isolator on `[0, 1]`.
//! - [`lie`]: rotation matrices and skew-symmetric matrices connected by matrix log/exp.
//! - [`bezier`]: Bezier curves evaluated through a cached characteristic matrix.
//!
//! Vectors and matrices are `nalgebra` dynamic types so that the same code serves planar and
//! spatial robots. Dimensions of caller-supplied operands are checked and reported as
//! [`GeomError::DimensionMismatch`], never truncated.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod bezier;
pub mod lie;
pub mod poly;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};

// Internal
pub use bezier::BezierCurve;
pub use lie::{RotationMatrix, SkewSymmetricMatrix};
pub use poly::{Polynomial, RootIsolator};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Magnitude below which a vector is considered to have no direction.
pub const ZERO_VECTOR_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by geometric and algebraic operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeomError {
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Cannot normalise a zero length vector")]
    ZeroVector,

    #[error("The curve derivative has zero magnitude at t = {t}")]
    ZeroDerivative { t: f64 },

    #[error("The curve has zero curvature at t = {t}, no principal normal exists")]
    ZeroCurvature { t: f64 },

    #[error("Cannot build a curve from an empty list of control points")]
    EmptyControlPoints,

    #[error("Matrix rows must all have the same length (row {row} has {found}, expected {expected})")]
    JaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot build a matrix with no rows or columns")]
    EmptyMatrix,

    #[error("Expected a square matrix, found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix is not skew-symmetric at ({row}, {col})")]
    NotSkewSymmetric { row: usize, col: usize },

    #[error("Diagonal entry {index} of a skew-symmetric matrix must be zero")]
    NonZeroDiagonal { index: usize },

    #[error("Matrix is not a rotation (orthogonality error {ortho_err:.3e}, determinant {det:.6})")]
    NotARotation { ortho_err: f64, det: f64 },

    #[error("No principal logarithm found for the rotation (|R - I| = {residual:.3e})")]
    NoPrincipalLog { residual: f64 },

    #[error("Index ({row}, {col}) is out of range for a {dim}x{dim} matrix")]
    IndexOutOfRange { row: usize, col: usize, dim: usize },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Check that `found` matches the `expected` dimension.
pub fn check_dim(expected: usize, found: usize) -> Result<(), GeomError> {
    if expected != found {
        Err(GeomError::DimensionMismatch { expected, found })
    } else {
        Ok(())
    }
}

/// Return the unit vector in the direction of `v`.
pub fn normalize(v: &DVector<f64>) -> Result<DVector<f64>, GeomError> {
    let norm = v.norm();

    if norm < ZERO_VECTOR_EPS {
        return Err(GeomError::ZeroVector);
    }

    Ok(v / norm)
}

/// Project `v` onto the direction of `onto`.
pub fn project_onto(v: &DVector<f64>, onto: &DVector<f64>) -> Result<DVector<f64>, GeomError> {
    check_dim(onto.len(), v.len())?;

    let norm_sq = onto.norm_squared();
    if norm_sq < ZERO_VECTOR_EPS * ZERO_VECTOR_EPS {
        return Err(GeomError::ZeroVector);
    }

    Ok(onto * (v.dot(onto) / norm_sq))
}

/// Build a dense matrix from row slices, rejecting empty and jagged input.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>, GeomError> {
    let num_cols = match rows.first() {
        Some(r) if !r.is_empty() => r.len(),
        _ => return Err(GeomError::EmptyMatrix),
    };

    for (i, r) in rows.iter().enumerate() {
        if r.len() != num_cols {
            return Err(GeomError::JaggedRows {
                row: i,
                expected: num_cols,
                found: r.len(),
            });
        }
    }

    Ok(DMatrix::from_fn(rows.len(), num_cols, |i, j| rows[i][j]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        let n = normalize(&v).unwrap();
        assert!((n[0] - 0.6).abs() < 1e-12);
        assert!((n[1] - 0.8).abs() < 1e-12);

        assert_eq!(
            normalize(&DVector::zeros(3)),
            Err(GeomError::ZeroVector)
        );
    }

    #[test]
    fn test_project_onto() {
        let v = DVector::from_vec(vec![1.0, 2.0]);
        let onto = DVector::from_vec(vec![2.0, 0.0]);
        let p = project_onto(&v, &onto).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);

        assert_eq!(
            project_onto(&v, &DVector::zeros(3)),
            Err(GeomError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_matrix_from_rows() {
        let m = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m[(1, 0)], 3.0);

        assert_eq!(
            matrix_from_rows(&[vec![1.0, 2.0], vec![3.0]]),
            Err(GeomError::JaggedRows {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(matrix_from_rows(&[]), Err(GeomError::EmptyMatrix));
    }
}
