//! # Rotation group operators
//!
//! [`RotationMatrix`] is an element of SO(n) and [`SkewSymmetricMatrix`] an element of its Lie
//! algebra so(n). The two are connected by truncated matrix power series:
//!
//! ```text
//! log(R) = (R - I) - (R - I)^2 / 2 + (R - I)^3 / 3 - ...     (at most 50 terms)
//! exp(A) = I + A + A^2 / 2! + A^3 / 3! + ...                  (at most 20 terms)
//! ```
//!
//! Both stop early once the Frobenius norm of the latest term drops below `1e-10`. Each series is
//! only applied close to its expansion point:
//!
//! - `log` takes repeated matrix square roots of `R` (Denman-Beavers iteration) until
//!   `|R^(1/2^k) - I| < 0.5`, sums the series there and multiplies the result by `2^k`.
//! - `exp` scales `A` by `2^-k` until `|A / 2^k| < 0.5`, sums the series and squares the result
//!   `k` times.
//!
//! Rotations by exactly pi have no principal logarithm and give a
//! [`GeomError::NoPrincipalLog`] error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::{DMatrix, DVector, Vector3};
use serde::Serialize;

// Internal
use super::{check_dim, matrix_from_rows, GeomError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of terms of the log series.
const LOG_MAX_TERMS: usize = 50;

/// Maximum number of terms of the exp series.
const EXP_MAX_TERMS: usize = 20;

/// Frobenius norm of a series term below which the series is considered converged.
const SERIES_EPS: f64 = 1e-10;

/// Distance from the expansion point below which a series is summed directly.
const SERIES_RADIUS: f64 = 0.5;

/// Value of `det(R + I)` below which `R` is treated as containing a half turn.
const HALF_TURN_EPS: f64 = 1e-10;

/// Maximum number of square roots taken before the log series.
const LOG_MAX_SQRTS: usize = 16;

/// Maximum number of iterations of a single matrix square root.
const SQRT_MAX_ITERS: usize = 100;

/// Maximum number of squarings after the exp series.
const EXP_MAX_SQUARINGS: i32 = 64;

/// Tolerance on skew-symmetry of caller-supplied matrices.
pub const SKEW_EPS: f64 = 1e-9;

/// Tolerance on orthogonality and determinant of caller-supplied rotations.
pub const ROTATION_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An n-dimensional rotation: an orthogonal matrix with determinant +1.
///
/// Rotations built from caller data are checked, rotations produced by composition, transpose
/// and [`SkewSymmetricMatrix::exp`] are trusted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationMatrix {
    mat: DMatrix<f64>,
}

/// A skew-symmetric matrix, `M[i][j] == -M[j][i]` with a zero diagonal.
///
/// The invariant is checked on construction and maintained by [`SkewSymmetricMatrix::set`],
/// which mirrors every write onto the transposed entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkewSymmetricMatrix {
    mat: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RotationMatrix {
    /// The identity rotation in `n` dimensions.
    pub fn identity(n: usize) -> Self {
        Self {
            mat: DMatrix::identity(n, n),
        }
    }

    /// A planar rotation by `angle_rad` (counter-clockwise).
    pub fn from_2d_angle(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();

        Self {
            mat: DMatrix::from_row_slice(2, 2, &[c, -s, s, c]),
        }
    }

    /// A spatial rotation by `angle_rad` about the X axis.
    pub fn from_3d_rotation_x(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();

        Self {
            mat: DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c]),
        }
    }

    /// A spatial rotation by `angle_rad` about the Y axis.
    pub fn from_3d_rotation_y(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();

        Self {
            mat: DMatrix::from_row_slice(3, 3, &[c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c]),
        }
    }

    /// A spatial rotation by `angle_rad` about the Z axis.
    pub fn from_3d_rotation_z(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();

        Self {
            mat: DMatrix::from_row_slice(3, 3, &[c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0]),
        }
    }

    /// Build a rotation from a matrix, checking that it is square, orthogonal and has a
    /// determinant of +1 (within [`ROTATION_EPS`]).
    pub fn try_from_matrix(mat: DMatrix<f64>) -> Result<Self, GeomError> {
        if mat.nrows() == 0 {
            return Err(GeomError::EmptyMatrix);
        }
        if mat.nrows() != mat.ncols() {
            return Err(GeomError::NotSquare {
                rows: mat.nrows(),
                cols: mat.ncols(),
            });
        }

        let n = mat.nrows();
        let ortho_err = (mat.transpose() * &mat - DMatrix::<f64>::identity(n, n)).norm();
        let det = mat.determinant();

        if ortho_err > ROTATION_EPS || (det - 1.0).abs() > ROTATION_EPS {
            return Err(GeomError::NotARotation { ortho_err, det });
        }

        Ok(Self { mat })
    }

    /// Build a rotation from its rows, see [`RotationMatrix::try_from_matrix`].
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, GeomError> {
        Self::try_from_matrix(matrix_from_rows(rows)?)
    }

    pub fn dim(&self) -> usize {
        self.mat.nrows()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.mat
    }

    /// The composition `self * other`, i.e. `other` applied first.
    pub fn compose(&self, other: &Self) -> Result<Self, GeomError> {
        check_dim(self.dim(), other.dim())?;

        Ok(Self {
            mat: &self.mat * &other.mat,
        })
    }

    /// The inverse rotation.
    pub fn transpose(&self) -> Self {
        Self {
            mat: self.mat.transpose(),
        }
    }

    /// Rotate a vector.
    pub fn apply(&self, v: &DVector<f64>) -> Result<DVector<f64>, GeomError> {
        check_dim(self.dim(), v.len())?;

        Ok(&self.mat * v)
    }

    /// The angle of a planar rotation, in `(-pi, pi]`.
    pub fn angle_2d(&self) -> Result<f64, GeomError> {
        check_dim(2, self.dim())?;

        Ok(self.mat[(1, 0)].atan2(self.mat[(0, 0)]))
    }

    /// Principal matrix logarithm, by inverse scaling and squaring around the power series.
    ///
    /// The result is projected onto so(n) (`(X - X^T) / 2`) to remove round-off before being
    /// returned as a skew-symmetric matrix. Rotations with an eigenvalue of -1 (a half turn)
    /// have no principal logarithm and give [`GeomError::NoPrincipalLog`].
    pub fn log(&self) -> Result<SkewSymmetricMatrix, GeomError> {
        let n = self.dim();
        let identity = DMatrix::<f64>::identity(n, n);

        // An eigenvalue of -1 makes R + I singular
        if (&self.mat + &identity).determinant().abs() < HALF_TURN_EPS {
            return Err(GeomError::NoPrincipalLog {
                residual: (&self.mat - &identity).norm(),
            });
        }

        // R^(1/2^k) is the rotation by 1/2^k of the angle
        let mut root = self.mat.clone();
        let mut sqrts = 0;
        while (&root - &identity).norm() >= SERIES_RADIUS {
            let residual = (&root - &identity).norm();
            if sqrts == LOG_MAX_SQRTS {
                return Err(GeomError::NoPrincipalLog { residual });
            }

            root = matrix_sqrt(&root).ok_or(GeomError::NoPrincipalLog { residual })?;
            sqrts += 1;
        }

        let x = root - identity;
        let mut term = x.clone();
        let mut result = x.clone();
        let mut converged = term.norm() < SERIES_EPS;

        for k in 2..LOG_MAX_TERMS {
            if converged {
                break;
            }

            term = &term * &x;
            let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
            let increment = &term * (sign / k as f64);
            result += &increment;

            converged = increment.norm() < SERIES_EPS;
        }

        if !converged {
            warn!(
                "Rotation log series did not converge after {} square roots (|R - I| = {:.3e})",
                sqrts,
                x.norm()
            );
            return Err(GeomError::NoPrincipalLog {
                residual: (&self.mat - DMatrix::<f64>::identity(n, n)).norm(),
            });
        }

        Ok(SkewSymmetricMatrix::project(
            &(result * 2f64.powi(sqrts as i32)),
        ))
    }
}

impl SkewSymmetricMatrix {
    /// The zero matrix of so(n).
    pub fn zeros(n: usize) -> Self {
        Self {
            mat: DMatrix::zeros(n, n),
        }
    }

    /// Build a skew-symmetric matrix, checking the invariant within [`SKEW_EPS`].
    pub fn try_from_matrix(mat: DMatrix<f64>) -> Result<Self, GeomError> {
        if mat.nrows() != mat.ncols() {
            return Err(GeomError::NotSquare {
                rows: mat.nrows(),
                cols: mat.ncols(),
            });
        }

        let n = mat.nrows();
        for i in 0..n {
            if mat[(i, i)].abs() > SKEW_EPS {
                return Err(GeomError::NonZeroDiagonal { index: i });
            }
            for j in (i + 1)..n {
                if (mat[(i, j)] + mat[(j, i)]).abs() > SKEW_EPS {
                    return Err(GeomError::NotSkewSymmetric { row: i, col: j });
                }
            }
        }

        Ok(Self { mat })
    }

    /// Build a skew-symmetric matrix from its rows, see [`SkewSymmetricMatrix::try_from_matrix`].
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, GeomError> {
        Self::try_from_matrix(matrix_from_rows(rows)?)
    }

    /// The planar angular rate `omega` as an element of so(2).
    pub fn hat_2d(omega: f64) -> Self {
        Self {
            mat: DMatrix::from_row_slice(2, 2, &[0.0, -omega, omega, 0.0]),
        }
    }

    /// The cross-product matrix of `w`, so that `hat_3d(w) * v == w.cross(v)`.
    pub fn hat_3d(w: &Vector3<f64>) -> Self {
        Self {
            mat: DMatrix::from_row_slice(
                3,
                3,
                &[0.0, -w.z, w.y, w.z, 0.0, -w.x, -w.y, w.x, 0.0],
            ),
        }
    }

    /// The inverse of `hat_2d`/`hat_3d`: the rate vector of a 2 or 3 dimensional matrix.
    ///
    /// Returns `None` for other dimensions, which have no vector form.
    pub fn vee(&self) -> Option<DVector<f64>> {
        let m = &self.mat;

        match self.dim() {
            2 => Some(DVector::from_vec(vec![m[(1, 0)]])),
            3 => Some(DVector::from_vec(vec![m[(2, 1)], m[(0, 2)], m[(1, 0)]])),
            _ => None,
        }
    }

    /// Project any square matrix onto so(n) as `(M - M^T) / 2`.
    pub(crate) fn project(mat: &DMatrix<f64>) -> Self {
        Self {
            mat: (mat - mat.transpose()) * 0.5,
        }
    }

    pub fn dim(&self) -> usize {
        self.mat.nrows()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.mat
    }

    /// Entry `(i, j)`, or `None` if the index is out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.mat.get((i, j)).copied()
    }

    /// Set entry `(i, j)` to `value` and entry `(j, i)` to `-value`.
    ///
    /// Setting a diagonal entry to anything but zero is an error.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<(), GeomError> {
        if i >= self.dim() || j >= self.dim() {
            return Err(GeomError::IndexOutOfRange {
                row: i,
                col: j,
                dim: self.dim(),
            });
        }
        if i == j {
            if value.abs() > SKEW_EPS {
                return Err(GeomError::NonZeroDiagonal { index: i });
            }
            return Ok(());
        }

        self.mat[(i, j)] = value;
        self.mat[(j, i)] = -value;

        Ok(())
    }

    pub fn scale(&self, scalar: f64) -> Self {
        Self {
            mat: &self.mat * scalar,
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self, GeomError> {
        check_dim(self.dim(), other.dim())?;

        Ok(Self {
            mat: &self.mat + &other.mat,
        })
    }

    pub fn transpose(&self) -> Self {
        self.scale(-1.0)
    }

    pub fn frobenius_norm(&self) -> f64 {
        self.mat.norm()
    }

    /// Matrix exponential by scaling and squaring around the power series.
    pub fn exp(&self) -> RotationMatrix {
        let n = self.dim();
        let norm = self.mat.norm();
        let squarings = if norm > SERIES_RADIUS {
            ((norm / SERIES_RADIUS).log2().ceil() as i32).min(EXP_MAX_SQUARINGS)
        } else {
            0
        };
        let scaled = &self.mat / 2f64.powi(squarings);

        let mut term = DMatrix::<f64>::identity(n, n);
        let mut result = DMatrix::<f64>::identity(n, n);
        let mut factorial = 1.0;

        for k in 1..EXP_MAX_TERMS {
            term = &term * &scaled;
            factorial *= k as f64;
            let increment = &term / factorial;
            result += &increment;

            if increment.norm() < SERIES_EPS {
                break;
            }
        }

        for _ in 0..squarings {
            result = &result * &result;
        }

        RotationMatrix { mat: result }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The orientation error between two rotations, `log(target * current^T)`.
///
/// Its Frobenius norm is a proxy for the geodesic distance between the rotations.
pub fn orientation_error(
    current: &RotationMatrix,
    target: &RotationMatrix,
) -> Result<SkewSymmetricMatrix, GeomError> {
    target.compose(&current.transpose())?.log()
}

/// Geodesic interpolation between two rotations.
///
/// Returns `c -> start * exp(c * log(start^T * end))`, which moves from `start` at `c = 0` to
/// `end` at `c = 1` with constant angular velocity.
pub fn interpolate(
    start: &RotationMatrix,
    end: &RotationMatrix,
) -> Result<impl Fn(f64) -> RotationMatrix, GeomError> {
    let relative = start.transpose().compose(end)?;
    let log_rel = relative.log()?;
    let start = start.clone();

    Ok(move |c: f64| RotationMatrix {
        mat: &start.mat * log_rel.scale(c).exp().mat,
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Principal square root of a matrix by Denman-Beavers iteration.
///
/// Returns `None` if an iterate becomes singular or the iteration does not settle, which is the
/// case for matrices with eigenvalues on the negative real axis.
fn matrix_sqrt(mat: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = mat.nrows();
    let mut y = mat.clone();
    let mut z = DMatrix::<f64>::identity(n, n);

    for _ in 0..SQRT_MAX_ITERS {
        let y_inv = y.clone().try_inverse()?;
        let z_inv = z.clone().try_inverse()?;

        let y_next = (&y + z_inv) * 0.5;
        z = (&z + y_inv) * 0.5;

        let change = (&y_next - &y).norm();
        y = y_next;

        if !change.is_finite() {
            return None;
        }
        if change < SERIES_EPS {
            return Some(y);
        }
    }

    None
}
