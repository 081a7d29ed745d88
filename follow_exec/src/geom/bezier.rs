//! # Bezier curves
//!
//! A curve of degree `N` in `D` dimensions is stored through its characteristic matrix
//! `Phi = M * P`, where `P` holds the `N + 1` control points as rows and `M` converts the
//! Bernstein basis to the power basis. Row `i` of `Phi` is the coefficient vector of `t^(N - i)`,
//! so that
//!
//! ```text
//! r(t) = [t^N, t^(N-1), ..., t, 1] * Phi
//! ```
//!
//! and every derivative is the same product with a differentiated power row.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

// Internal
use super::{check_dim, normalize, GeomError, Polynomial, ZERO_VECTOR_EPS};
use util::maths::{binomial, falling_factorial, simpson};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of Simpson panels used to integrate arc length.
pub const ARC_LENGTH_PANELS: usize = 64;

/// Part of `r''` orthogonal to `r'`, relative to `|r''|`, below which the curve is straight.
pub const CURVATURE_REL_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A Bezier curve parametrised on `t` in `[0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct BezierCurve {
    control_points: Vec<DVector<f64>>,

    /// `(N + 1) x D` characteristic matrix, rows in descending power of `t`.
    phi: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BezierCurve {
    /// Build a curve from its control points.
    ///
    /// All points must share the dimension of the first one.
    pub fn new(control_points: Vec<DVector<f64>>) -> Result<Self, GeomError> {
        let dim = match control_points.first() {
            Some(p) => p.len(),
            None => return Err(GeomError::EmptyControlPoints),
        };

        for p in control_points.iter() {
            check_dim(dim, p.len())?;
        }

        let phi = Self::basis_matrix(control_points.len() - 1)
            * DMatrix::from_fn(control_points.len(), dim, |i, j| control_points[i][j]);

        Ok(Self {
            control_points,
            phi,
        })
    }

    /// Bernstein to power basis conversion matrix of degree `n`.
    ///
    /// Entry `(n - p, j)` is the coefficient of `t^p` in the `j`th Bernstein polynomial,
    /// `C(n, j) C(n - j, p - j) (-1)^(p - j)` for `j <= p`.
    fn basis_matrix(n: usize) -> DMatrix<f64> {
        let n32 = n as u32;

        DMatrix::from_fn(n + 1, n + 1, |row, j| {
            let p = n - row;
            if j > p {
                return 0.0;
            }

            let sign = if (p - j) % 2 == 0 { 1.0 } else { -1.0 };
            sign * binomial(n32, j as u32) * binomial(n32 - j as u32, (p - j) as u32)
        })
    }

    pub fn degree(&self) -> usize {
        self.control_points.len() - 1
    }

    pub fn dimension(&self) -> usize {
        self.phi.ncols()
    }

    pub fn control_points(&self) -> &[DVector<f64>] {
        &self.control_points
    }

    pub fn characteristic_matrix(&self) -> &DMatrix<f64> {
        &self.phi
    }

    /// The point on the curve at `t`.
    pub fn evaluate(&self, t: f64) -> DVector<f64> {
        self.nth_derivative(t, 0)
    }

    pub fn derivative(&self, t: f64) -> DVector<f64> {
        self.nth_derivative(t, 1)
    }

    pub fn second_derivative(&self, t: f64) -> DVector<f64> {
        self.nth_derivative(t, 2)
    }

    /// The `k`th derivative of the curve at `t`.
    ///
    /// Derivatives of order higher than the degree are zero.
    pub fn nth_derivative(&self, t: f64, k: usize) -> DVector<f64> {
        let n = self.degree();
        let k32 = k as u32;

        let powers = DMatrix::from_fn(1, n + 1, |_, i| {
            let p = n - i;
            if p < k {
                0.0
            } else {
                falling_factorial::<f64>(p as u32, k32) * t.powi((p - k) as i32)
            }
        });

        (powers * &self.phi).transpose().column(0).into_owned()
    }

    /// The (unnormalised) tangent at `t`, equal to the first derivative.
    pub fn tangent(&self, t: f64) -> DVector<f64> {
        self.derivative(t)
    }

    /// The principal unit normal at `t`.
    ///
    /// This is the direction of the derivative of the unit tangent, i.e. the component of `r''`
    /// orthogonal to `r'`. Stationary points give a [`GeomError::ZeroDerivative`] error and
    /// straight portions of the curve a [`GeomError::ZeroCurvature`] error.
    pub fn principal_normal(&self, t: f64) -> Result<DVector<f64>, GeomError> {
        let d1 = self.derivative(t);
        let d1_norm_sq = d1.norm_squared();

        if d1_norm_sq.sqrt() < ZERO_VECTOR_EPS {
            return Err(GeomError::ZeroDerivative { t });
        }

        let d2 = self.second_derivative(t);
        let perp = &d2 - &d1 * (d2.dot(&d1) / d1_norm_sq);

        // Relative to r'' so that round-off on large straight curves is not taken as curvature
        if perp.norm() < CURVATURE_REL_EPS * d2.norm().max(1.0) {
            return Err(GeomError::ZeroCurvature { t });
        }

        normalize(&perp).map_err(|_| GeomError::ZeroCurvature { t })
    }

    /// The polynomial in `t` whose roots are the stationary points of the squared distance
    /// between the curve and `point`.
    ///
    /// This is half the derivative of `|r(t) - point|^2`, `sum_d (r_d(t) - point_d) r_d'(t)`.
    pub fn distance_derivative_polynomial(
        &self,
        point: &DVector<f64>,
    ) -> Result<Polynomial, GeomError> {
        check_dim(self.dimension(), point.len())?;

        Ok((0..self.dimension()).fold(Polynomial::zero(), |acc, d| {
            let coord = self.coordinate_polynomial(d);
            let offset = coord.add_scalar(-point[d]);
            acc.add(&offset.multiply(&coord.derivative()))
        }))
    }

    /// The power-basis polynomial of coordinate `d`.
    fn coordinate_polynomial(&self, d: usize) -> Polynomial {
        let n = self.degree();

        Polynomial::new((0..=n).map(|p| self.phi[(n - p, d)]).collect())
    }

    /// Length of the curve between `t0` and `t1`.
    pub fn arc_length(&self, t0: f64, t1: f64) -> f64 {
        simpson(|t| self.derivative(t).norm(), t0, t1, ARC_LENGTH_PANELS)
    }

    /// Total length of the curve.
    pub fn length(&self) -> f64 {
        self.arc_length(0.0, 1.0)
    }

    /// Length of the curve still to travel from `t` to the end.
    pub fn distance_remaining(&self, t: f64) -> f64 {
        self.arc_length(t, 1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pt(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    fn close(a: &DVector<f64>, b: &DVector<f64>, tol: f64) -> bool {
        (a - b).norm() < tol
    }

    fn quadratic() -> BezierCurve {
        BezierCurve::new(vec![pt(0.0, 0.0), pt(1.0, 2.0), pt(2.0, 0.0)]).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            BezierCurve::new(vec![]).unwrap_err(),
            GeomError::EmptyControlPoints
        );
        assert_eq!(
            BezierCurve::new(vec![pt(0.0, 0.0), DVector::zeros(3)]).unwrap_err(),
            GeomError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );

        let c = quadratic();
        assert_eq!(c.degree(), 2);
        assert_eq!(c.dimension(), 2);
        assert_eq!(c.characteristic_matrix().shape(), (3, 2));
    }

    #[test]
    fn test_endpoints() {
        let cubic = BezierCurve::new(vec![
            pt(0.0, 0.0),
            pt(1.0, 3.0),
            pt(3.0, -1.0),
            pt(4.0, 2.0),
        ])
        .unwrap();

        assert!(close(&cubic.evaluate(0.0), &pt(0.0, 0.0), 1e-12));
        assert!(close(&cubic.evaluate(1.0), &pt(4.0, 2.0), 1e-12));

        // Quadratic midpoint is P0/4 + P1/2 + P2/4
        assert!(close(&quadratic().evaluate(0.5), &pt(1.0, 1.0), 1e-12));

        let single = BezierCurve::new(vec![pt(1.5, -2.0)]).unwrap();
        assert!(close(&single.evaluate(0.3), &pt(1.5, -2.0), 1e-12));
        assert!(close(&single.derivative(0.3), &pt(0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_straight_line() {
        let line = BezierCurve::new(vec![pt(0.0, 0.0), pt(2.0, 4.0)]).unwrap();

        assert!(close(&line.evaluate(0.25), &pt(0.5, 1.0), 1e-12));
        assert!(close(&line.derivative(0.7), &pt(2.0, 4.0), 1e-12));
        assert!((line.length() - 20f64.sqrt()).abs() < 1e-9);
        assert!((line.distance_remaining(0.5) - 0.5 * 20f64.sqrt()).abs() < 1e-9);

        // Unevenly spaced collinear points still trace the line, monotonically in t
        let start = pt(-1.0, 2.0);
        let dir = pt(3.0, -1.0);
        let cubic = BezierCurve::new(vec![
            &start + &dir * 0.0,
            &start + &dir * 0.1,
            &start + &dir * 0.75,
            &start + &dir * 2.0,
        ])
        .unwrap();

        let mut prev_s = std::f64::NEG_INFINITY;
        for i in 0..=50 {
            let rel = cubic.evaluate(i as f64 / 50.0) - &start;
            let cross = rel[0] * dir[1] - rel[1] * dir[0];
            assert!(cross.abs() < 1e-10, "off the line at t = {}", i as f64 / 50.0);

            let s = rel.dot(&dir) / dir.norm_squared();
            assert!((-1e-12..=2.0 + 1e-12).contains(&s));
            assert!(s >= prev_s - 1e-12);
            prev_s = s;
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let c = quadratic();
        let h = 1e-6;

        for &t in [0.1, 0.5, 0.9].iter() {
            let fd = (c.evaluate(t + h) - c.evaluate(t - h)) / (2.0 * h);
            assert!(close(&c.derivative(t), &fd, 1e-6));

            let fd2 = (c.derivative(t + h) - c.derivative(t - h)) / (2.0 * h);
            assert!(close(&c.second_derivative(t), &fd2, 1e-5));
        }

        // The third derivative of a quadratic vanishes
        assert!(close(&c.nth_derivative(0.4, 3), &pt(0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_principal_normal() {
        let c = quadratic();

        // At the apex the tangent is horizontal and the curve bends downwards
        let n = c.principal_normal(0.5).unwrap();
        assert!(close(&n, &pt(0.0, -1.0), 1e-9));

        // Normal is orthogonal to the tangent everywhere
        let n = c.principal_normal(0.2).unwrap();
        assert!(n.dot(&c.tangent(0.2)).abs() < 1e-9);
        assert!((n.norm() - 1.0).abs() < 1e-9);

        let line = BezierCurve::new(vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)]).unwrap();
        assert_eq!(
            line.principal_normal(0.3),
            Err(GeomError::ZeroCurvature { t: 0.3 })
        );

        // Round-off on a large collinear curve is not curvature
        for &scale in [1.0, 1e4, 1e6].iter() {
            let line = BezierCurve::new(vec![
                pt(0.0, 0.0),
                pt(scale, 3.0 * scale),
                pt(3.0 * scale, 9.0 * scale),
            ])
            .unwrap();

            for i in 0..=20 {
                let t = i as f64 / 20.0;
                assert_eq!(
                    line.principal_normal(t),
                    Err(GeomError::ZeroCurvature { t }),
                    "scale {}",
                    scale
                );
            }
        }

        let stationary = BezierCurve::new(vec![pt(1.0, 1.0), pt(1.0, 1.0)]).unwrap();
        assert_eq!(
            stationary.principal_normal(0.5),
            Err(GeomError::ZeroDerivative { t: 0.5 })
        );
    }

    #[test]
    fn test_distance_derivative_polynomial() {
        let c = quadratic();
        let query = pt(1.0, 3.0);
        let poly = c.distance_derivative_polynomial(&query).unwrap();

        // Apex is the closest point, so the derivative vanishes at t = 0.5
        assert!(poly.evaluate(0.5).abs() < 1e-12);
        assert_eq!(poly.degree(), 3);

        for &t in [0.2, 0.7].iter() {
            let expected = (c.evaluate(t) - &query).dot(&c.derivative(t));
            assert!((poly.evaluate(t) - expected).abs() < 1e-9);
        }

        assert!(matches!(
            c.distance_derivative_polynomial(&DVector::zeros(3)),
            Err(GeomError::DimensionMismatch { .. })
        ));
    }
}
