//! # Polynomials
//!
//! Power-basis polynomials and the root isolator used for closest-point projection.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A polynomial in the power basis.
///
/// `coeffs[i]` is the coefficient of `t^i`, so the degree is `coeffs.len() - 1`. There is always
/// at least one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

/// Finds the real roots of a polynomial in `[0, 1]`.
///
/// The interval is bisected recursively. At each node the polynomial is re-expressed over the
/// node's sub-interval and the sign changes of its Bernstein coefficients on that sub-interval
/// are counted (coefficients smaller than [`RootIsolator::EPS`] are ignored). Counting in the
/// Bernstein basis bounds the roots inside the node only, where power-basis coefficients would
/// also count every root to the right of it:
///
/// - no sign change: the node is pruned,
/// - one sign change: the root is refined by bisection on the node's endpoints,
/// - more: the node is split at its midpoint, up to [`RootIsolator::MAX_DEPTH`] levels.
///
/// The sign-change count is a Descartes-style heuristic, not a Sturm count. Double roots,
/// clustered roots and roots whose node never brackets a sign change can be missed, and
/// branches deeper than the maximum depth are abandoned. Missing a root is never an error, the
/// caller is expected to check the interval endpoints as well.
pub struct RootIsolator;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Polynomial {
    /// Create a new polynomial from its coefficients, lowest power first.
    ///
    /// An empty list gives the zero polynomial.
    pub fn new(coeffs: Vec<f64>) -> Self {
        if coeffs.is_empty() {
            Self::zero()
        } else {
            Self { coeffs }
        }
    }

    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// A constant polynomial.
    pub fn constant(c: f64) -> Self {
        Self { coeffs: vec![c] }
    }

    /// The monic polynomial with the given roots, `(t - r_0)(t - r_1)...`.
    pub fn from_roots(roots: &[f64]) -> Self {
        roots.iter().fold(Self::constant(1.0), |acc, r| {
            acc.multiply(&Self::new(vec![-r, 1.0]))
        })
    }

    /// Returns `(t_min + scale * u)^k` as a polynomial in `u`.
    pub fn pow_affine(k: usize, t_min: f64, scale: f64) -> Self {
        let affine = Self::new(vec![t_min, scale]);

        (0..k).fold(Self::constant(1.0), |acc, _| acc.multiply(&affine))
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Evaluate the polynomial at `t` using Horner's scheme.
    pub fn evaluate(&self, t: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    pub fn derivative(&self) -> Self {
        if self.coeffs.len() == 1 {
            return Self::zero();
        }

        Self {
            coeffs: self
                .coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, c)| i as f64 * c)
                .collect(),
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());

        Self {
            coeffs: (0..len)
                .map(|i| {
                    self.coeffs.get(i).copied().unwrap_or(0.0)
                        + other.coeffs.get(i).copied().unwrap_or(0.0)
                })
                .collect(),
        }
    }

    /// Add a constant to the polynomial.
    pub fn add_scalar(&self, c: f64) -> Self {
        let mut coeffs = self.coeffs.clone();
        coeffs[0] += c;
        Self { coeffs }
    }

    pub fn scale(&self, scalar: f64) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|c| c * scalar).collect(),
        }
    }

    /// Multiply two polynomials (convolution of the coefficients).
    pub fn multiply(&self, other: &Self) -> Self {
        let mut product = vec![0.0; self.degree() + other.degree() + 1];

        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                product[i + j] += a * b;
            }
        }

        Self { coeffs: product }
    }

    /// Coefficients of the polynomial in the Bernstein basis of its own degree on `[0, 1]`.
    ///
    /// `b_j = sum_{i <= j} C(j, i) / C(n, i) a_i`. The weights are built by the running product
    /// `C(j, i + 1) / C(n, i + 1) = C(j, i) / C(n, i) (j - i) / (n - i)`, which stays in `[0, 1]`
    /// for any degree.
    pub fn bernstein_coeffs(&self) -> Vec<f64> {
        let n = self.degree();

        (0..=n)
            .map(|j| {
                let mut weight = 1.0;
                let mut b = 0.0;

                for i in 0..=j {
                    b += weight * self.coeffs[i];
                    if i < n {
                        weight *= (j - i) as f64 / (n - i) as f64;
                    }
                }

                b
            })
            .collect()
    }

    /// Re-express the polynomial over the sub-interval `[t_min, t_max]`.
    ///
    /// The returned polynomial `q` satisfies `q(u) = p(t_min + (t_max - t_min) u)`, so `u` in
    /// `[0, 1]` covers the sub-interval.
    pub fn reparametrize(&self, t_min: f64, t_max: f64) -> Self {
        let scale = t_max - t_min;

        self.coeffs
            .iter()
            .enumerate()
            .fold(Self::zero(), |acc, (k, c)| {
                acc.add(&Self::pow_affine(k, t_min, scale).scale(*c))
            })
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::new();

        for (i, c) in self.coeffs.iter().enumerate().rev() {
            if c.abs() < 1e-10 {
                continue;
            }

            let term = match i {
                0 => format!("{:.4}", c),
                1 => format!("{:.4}t", c),
                _ => format!("{:.4}t^{}", c, i),
            };
            terms.push(term);
        }

        if terms.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", terms.join(" + "))
        }
    }
}

impl RootIsolator {
    /// Tolerance used for ignoring small coefficients, accepting bisection midpoints and merging
    /// duplicate roots.
    pub const EPS: f64 = 1e-6;

    /// Maximum recursion depth of the interval subdivision.
    pub const MAX_DEPTH: usize = 30;

    /// Number of bisection iterations used to refine an isolated root.
    pub const BISECTION_ITERATIONS: usize = 50;

    /// Find the roots of `poly` in `[0, 1]`, in ascending order.
    pub fn find_roots_in_unit_interval(poly: &Polynomial) -> Vec<f64> {
        let mut roots = Vec::new();

        Self::find_roots_recursive(poly, poly, 0.0, 1.0, &mut roots, 0);

        // Subdivision visits the left half first so the roots are already sorted, but a root
        // sitting on a split point can be found from both sides.
        roots.dedup_by(|a, b| (*a - *b).abs() < Self::EPS);

        roots
    }

    /// Count sign changes in a coefficient sequence, ignoring near-zero coefficients.
    pub fn count_sign_changes(coeffs: &[f64]) -> usize {
        let mut changes = 0;
        let mut prev = 0.0;

        for c in coeffs.iter().filter(|c| c.abs() >= Self::EPS) {
            if prev != 0.0 && c * prev < 0.0 {
                changes += 1;
            }
            prev = *c;
        }

        changes
    }

    /// `poly` is the original polynomial over `[0, 1]`, `local` is the same polynomial
    /// re-expressed over `[t_min, t_max]`.
    fn find_roots_recursive(
        poly: &Polynomial,
        local: &Polynomial,
        t_min: f64,
        t_max: f64,
        roots: &mut Vec<f64>,
        depth: usize,
    ) {
        if depth > Self::MAX_DEPTH {
            trace!(
                "Root isolation abandoned [{:.6}, {:.6}] at depth {}",
                t_min,
                t_max,
                depth
            );
            return;
        }

        match Self::count_sign_changes(&local.bernstein_coeffs()) {
            0 => (),
            1 => match Self::bisection(poly, t_min, t_max) {
                Some(root) => roots.push(root),
                None => trace!(
                    "No sign change across [{:.6}, {:.6}], root dropped",
                    t_min,
                    t_max
                ),
            },
            _ => {
                let t_mid = 0.5 * (t_min + t_max);

                Self::find_roots_recursive(
                    poly,
                    &local.reparametrize(0.0, 0.5),
                    t_min,
                    t_mid,
                    roots,
                    depth + 1,
                );
                Self::find_roots_recursive(
                    poly,
                    &local.reparametrize(0.5, 1.0),
                    t_mid,
                    t_max,
                    roots,
                    depth + 1,
                );
            }
        }
    }

    /// Refine a root of `poly` bracketed by `[a, b]`.
    ///
    /// Returns `None` if the endpoint values have the same (non-zero) sign.
    fn bisection(poly: &Polynomial, mut a: f64, mut b: f64) -> Option<f64> {
        let mut fa = poly.evaluate(a);
        let fb = poly.evaluate(b);

        if fa * fb > 0.0 {
            return None;
        }
        if fa.abs() < Self::EPS {
            return Some(a);
        }
        if fb.abs() < Self::EPS {
            return Some(b);
        }

        for _ in 0..Self::BISECTION_ITERATIONS {
            let m = 0.5 * (a + b);
            let fm = poly.evaluate(m);

            if fm.abs() < Self::EPS {
                return Some(m);
            }

            if fa * fm < 0.0 {
                b = m;
            } else {
                a = m;
                fa = fm;
            }
        }

        Some(0.5 * (a + b))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_evaluate_and_derivative() {
        // 1 + 2t + 3t^2
        let p = Polynomial::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(p.degree(), 2);
        assert_eq!(p.evaluate(0.0), 1.0);
        assert_eq!(p.evaluate(2.0), 17.0);

        let d = p.derivative();
        assert_eq!(d.coeffs(), &[2.0, 6.0]);
        assert_eq!(d.derivative().derivative().coeffs(), &[0.0]);

        assert_eq!(Polynomial::new(vec![]).coeffs(), &[0.0]);
    }

    #[test]
    fn test_arithmetic() {
        let a = Polynomial::new(vec![1.0, 1.0]);
        let b = Polynomial::new(vec![-1.0, 0.0, 2.0]);

        assert_eq!(a.add(&b).coeffs(), &[0.0, 1.0, 2.0]);
        assert_eq!(a.add_scalar(2.0).coeffs(), &[3.0, 1.0]);
        assert_eq!(b.scale(0.5).coeffs(), &[-0.5, 0.0, 1.0]);
        assert_eq!(a.multiply(&a).coeffs(), &[1.0, 2.0, 1.0]);
        assert_eq!(
            Polynomial::from_roots(&[1.0, 2.0]).coeffs(),
            &[2.0, -3.0, 1.0]
        );
    }

    #[test]
    fn test_reparametrize() {
        let p = Polynomial::from_roots(&[0.2, 0.7, 0.9]);
        let q = p.reparametrize(0.25, 0.75);

        for i in 0..=10 {
            let u = i as f64 / 10.0;
            assert_close(q.evaluate(u), p.evaluate(0.25 + 0.5 * u), 1e-12);
        }
    }

    #[test]
    fn test_bernstein_coeffs() {
        // (t - 0.5)^2 = 0.25 - t + t^2
        let p = Polynomial::new(vec![0.25, -1.0, 1.0]);
        let b = p.bernstein_coeffs();
        assert_close(b[0], 0.25, 1e-12);
        assert_close(b[1], -0.25, 1e-12);
        assert_close(b[2], 0.25, 1e-12);

        // Endpoint coefficients are the endpoint values
        let p = Polynomial::from_roots(&[0.3, 1.4, -2.0]);
        let b = p.bernstein_coeffs();
        assert_close(b[0], p.evaluate(0.0), 1e-12);
        assert_close(b[3], p.evaluate(1.0), 1e-12);
    }

    #[test]
    fn test_display() {
        let p = Polynomial::new(vec![1.0, 0.0, -2.5]);
        assert_eq!(format!("{}", p), "-2.5000t^2 + 1.0000");
        assert_eq!(format!("{}", Polynomial::zero()), "0");
    }

    #[test]
    fn test_single_root() {
        let roots = RootIsolator::find_roots_in_unit_interval(&Polynomial::new(vec![-1.0, 2.0]));
        assert_eq!(roots.len(), 1);
        assert_close(roots[0], 0.5, 1e-5);
    }

    #[test]
    fn test_multiple_roots() {
        let p = Polynomial::from_roots(&[0.1, 0.45, 0.8]);
        let roots = RootIsolator::find_roots_in_unit_interval(&p);

        assert_eq!(roots.len(), 3);
        assert_close(roots[0], 0.1, 1e-5);
        assert_close(roots[1], 0.45, 1e-5);
        assert_close(roots[2], 0.8, 1e-5);
    }

    #[test]
    fn test_roots_outside_interval_ignored() {
        let p = Polynomial::from_roots(&[-0.5, 0.3, 1.7]);
        let roots = RootIsolator::find_roots_in_unit_interval(&p);

        assert_eq!(roots.len(), 1);
        assert_close(roots[0], 0.3, 1e-5);

        // No real roots at all
        let p = Polynomial::new(vec![1.0, 0.0, 1.0]);
        assert!(RootIsolator::find_roots_in_unit_interval(&p).is_empty());
    }

    #[test]
    fn test_double_root_is_best_effort() {
        // A double root never produces a sign change across its bracket, so the heuristic is
        // allowed to miss it. It must not panic or report spurious roots.
        let p = Polynomial::from_roots(&[0.5, 0.5]);
        let roots = RootIsolator::find_roots_in_unit_interval(&p);

        assert!(roots.len() <= 1);
        for r in roots {
            assert_close(r, 0.5, 1e-2);
        }
    }

    #[test]
    fn test_count_sign_changes() {
        assert_eq!(RootIsolator::count_sign_changes(&[1.0, -1.0, 1.0]), 2);
        assert_eq!(RootIsolator::count_sign_changes(&[1.0, 1e-9, 2.0]), 0);
        assert_eq!(RootIsolator::count_sign_changes(&[-1.0, 0.0, 0.0, 3.0]), 1);
    }
}
