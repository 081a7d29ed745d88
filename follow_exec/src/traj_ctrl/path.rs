//! # Path
//!
//! A path is a Bezier curve giving the target position together with a heading interpolation
//! function giving the target orientation at every curve parameter.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::DVector;

// Internal
use crate::geom::{BezierCurve, GeomError, RootIsolator, RotationMatrix};
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The information available to a heading interpolation function.
#[derive(Debug, Clone, Copy)]
pub struct CurveContext<'a> {
    /// The curve parameter in `[0, 1]`
    pub t: f64,

    /// The curve being followed
    pub curve: &'a BezierCurve,
}

/// Maps a point on the curve to the target orientation there.
pub type HeadingInterpolation = Box<dyn Fn(&CurveContext) -> RotationMatrix + Send>;

/// A path to follow.
pub struct Path {
    curve: BezierCurve,
    heading: HeadingInterpolation,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new path through the given control points.
    pub fn new(
        control_points: Vec<DVector<f64>>,
        heading: HeadingInterpolation,
    ) -> Result<Self, GeomError> {
        Ok(Self {
            curve: BezierCurve::new(control_points)?,
            heading,
        })
    }

    pub fn curve(&self) -> &BezierCurve {
        &self.curve
    }

    /// Replace the curve, keeping the heading interpolation.
    pub fn set_curve(&mut self, control_points: Vec<DVector<f64>>) -> Result<(), GeomError> {
        self.curve = BezierCurve::new(control_points)?;
        Ok(())
    }

    pub fn set_heading_interpolation(&mut self, heading: HeadingInterpolation) {
        self.heading = heading;
    }

    /// The target orientation at `t`.
    pub fn heading(&self, t: f64) -> RotationMatrix {
        (self.heading)(&CurveContext {
            t,
            curve: &self.curve,
        })
    }

    /// The target pose at `t`.
    ///
    /// Fails if the heading interpolation gives an orientation whose dimension differs from the
    /// curve's.
    pub fn pose(&self, t: f64) -> Result<Pose, GeomError> {
        Pose::new(self.curve.evaluate(t), self.heading(t))
    }

    /// The curve parameter of the point on the path closest to `position`.
    ///
    /// Candidates are the stationary points of the distance found by the root isolator plus
    /// both ends of the curve. Where candidates are equally close the one earliest along the
    /// path wins.
    pub fn closest_t(&self, position: &DVector<f64>) -> Result<f64, GeomError> {
        let poly = self.curve.distance_derivative_polynomial(position)?;

        let mut candidates = vec![0.0];
        candidates.extend(RootIsolator::find_roots_in_unit_interval(&poly));
        candidates.push(1.0);

        let mut best_t = 0.0;
        let mut best_dist_sq = std::f64::INFINITY;

        for t in candidates {
            let dist_sq = (self.curve.evaluate(t) - position).norm_squared();
            if dist_sq < best_dist_sq {
                best_t = t;
                best_dist_sq = dist_sq;
            }
        }

        Ok(best_t)
    }

    /// The target pose at the point on the path closest to `position`.
    pub fn closest_pose(&self, position: &DVector<f64>) -> Result<Pose, GeomError> {
        self.pose(self.closest_t(position)?)
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Path").field("curve", &self.curve).finish()
    }
}

/// Builders for common heading interpolation functions.
pub mod heading {
    use super::*;
    use crate::geom::lie;

    /// Keep the same orientation along the whole path.
    pub fn constant(orientation: RotationMatrix) -> HeadingInterpolation {
        Box::new(move |_: &CurveContext| orientation.clone())
    }

    /// Rotate along the geodesic from `start` at the beginning of the path to `end` at its end.
    pub fn linear(
        start: &RotationMatrix,
        end: &RotationMatrix,
    ) -> Result<HeadingInterpolation, GeomError> {
        let interp = lie::interpolate(start, end)?;

        Ok(Box::new(move |ctx: &CurveContext| interp(ctx.t)))
    }

    /// Face along the tangent of a planar curve.
    ///
    /// Where the tangent vanishes, or the curve is not planar, the identity is returned.
    pub fn tangent_2d() -> HeadingInterpolation {
        Box::new(|ctx: &CurveContext| {
            let tangent = ctx.curve.tangent(ctx.t);

            if tangent.len() != 2 || tangent.norm() < crate::geom::ZERO_VECTOR_EPS {
                return RotationMatrix::identity(tangent.len());
            }

            RotationMatrix::from_2d_angle(tangent[1].atan2(tangent[0]))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pt(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    fn arch() -> Path {
        Path::new(
            vec![pt(0.0, 0.0), pt(1.0, 2.0), pt(2.0, 0.0)],
            heading::constant(RotationMatrix::identity(2)),
        )
        .unwrap()
    }

    #[test]
    fn test_closest_t_interior() {
        let path = arch();

        // Directly above the apex
        let t = path.closest_t(&pt(1.0, 3.0)).unwrap();
        assert!((t - 0.5).abs() < 1e-5);

        // Point on the curve itself
        let on_curve = path.curve().evaluate(0.3);
        let t = path.closest_t(&on_curve).unwrap();
        assert!((t - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_closest_t_endpoints() {
        let path = arch();

        assert_eq!(path.closest_t(&pt(-1.0, -1.0)).unwrap(), 0.0);
        assert_eq!(path.closest_t(&pt(3.0, -1.0)).unwrap(), 1.0);

        assert!(matches!(
            path.closest_t(&DVector::zeros(3)),
            Err(GeomError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_closest_t_straight_line() {
        let path = Path::new(
            vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)],
            heading::constant(RotationMatrix::identity(2)),
        )
        .unwrap();

        let pose = path.closest_pose(&pt(0.5, 0.7)).unwrap();
        assert!((pose.position[0] - 0.5).abs() < 1e-5);
        assert!(pose.position[1].abs() < 1e-12);
    }

    #[test]
    fn test_closest_t_many_control_points() {
        // Degree 39 curve, the distance polynomial has degree 77
        let points = (0..40)
            .map(|i| pt(i as f64 * 0.5, (i as f64 * 0.4).sin()))
            .collect();
        let path = Path::new(points, heading::constant(RotationMatrix::identity(2))).unwrap();

        let query = pt(20.0, 2.0);
        let t = path.closest_t(&query).unwrap();
        assert!((0.0..=1.0).contains(&t));

        let dist = |t: f64| (path.curve().evaluate(t) - &query).norm();
        assert!(dist(t) <= dist(0.0));
        assert!(dist(t) <= dist(1.0));
    }

    #[test]
    fn test_heading_functions() {
        let mut path = arch();
        assert_eq!(path.heading(0.7), RotationMatrix::identity(2));

        path.set_heading_interpolation(heading::tangent_2d());
        let start = path.heading(0.0).angle_2d().unwrap();
        assert!((start - 2f64.atan2(1.0)).abs() < 1e-9);
        assert!(path.heading(0.5).angle_2d().unwrap().abs() < 1e-9);

        path.set_heading_interpolation(
            heading::linear(
                &RotationMatrix::from_2d_angle(0.0),
                &RotationMatrix::from_2d_angle(0.6),
            )
            .unwrap(),
        );
        assert!((path.heading(0.5).angle_2d().unwrap() - 0.3).abs() < 1e-6);

        // Orientation of the wrong dimension cannot form a pose
        path.set_heading_interpolation(heading::constant(RotationMatrix::identity(3)));
        assert!(path.pose(0.5).is_err());
    }

    #[test]
    fn test_set_curve() {
        let mut path = arch();
        path.set_curve(vec![pt(0.0, 0.0), pt(4.0, 0.0)]).unwrap();
        assert_eq!(path.curve().degree(), 1);
        assert!(path.set_curve(vec![]).is_err());
    }
}
