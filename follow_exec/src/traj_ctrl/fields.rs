//! # Guiding vector fields
//!
//! A guiding vector field maps the robot's pose to a desired motion. The follower sums four
//! Euclidean fields into a linear velocity:
//!
//! - [`TranslationalField`] pulls the robot towards the closest point of the path,
//! - [`DriveField`] pushes it along the path tangent, braking before the end,
//! - [`CentripetalField`] adds the feedforward needed to follow the path's curvature,
//!
//! and composes the sum with a [`RotationalField`] steering the orientation. The result is a
//! [`TangentBundle`], the commanded twist together with the orientation it applies to.
//!
//! Fields are evaluated through `&mut` so that a field can be composed while borrowed and its
//! diagnostics (e.g. [`TranslationalField::last_error`]) read back after evaluation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

// Internal
use super::Controller;
use crate::geom::{
    check_dim, lie, normalize, project_onto, BezierCurve, GeomError, RotationMatrix,
    SkewSymmetricMatrix, ZERO_VECTOR_EPS,
};
use crate::loc::{Pose, Twist};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A field mapping a pose to a desired motion.
pub trait GuidingVectorField {
    type Output;

    fn evaluate(&mut self, pose: &Pose) -> Result<Self::Output, GeomError>;
}

/// A field whose output is a vector in the robot's position space.
///
/// Euclidean fields can be summed with [`EuclideanField::add`].
pub trait EuclideanField: GuidingVectorField<Output = DVector<f64>> + Sized {
    /// The field evaluating to the sum of both fields.
    fn add<B: EuclideanField>(self, other: B) -> Sum<Self, B> {
        Sum { a: self, b: other }
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The commanded motion: a twist and the orientation it is expressed relative to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TangentBundle {
    pub twist: Twist,
    pub orientation: RotationMatrix,
}

/// The sum of two Euclidean fields.
pub struct Sum<A, B> {
    a: A,
    b: B,
}

/// A field defined by a closure.
pub struct FnField<F>(pub F);

/// A Euclidean and a rotational field evaluated together.
pub struct Composed<E, R> {
    euclidean: E,
    rotational: R,
    orientation: RotationMatrix,
}

/// Drives the position towards a target with a controller.
///
/// Evaluates to the unit vector towards the target scaled by the controller output. At the
/// target there is no direction and the field is zero.
pub struct TranslationalField<'a> {
    target: DVector<f64>,
    controller: &'a mut dyn Controller<DVector<f64>>,
    last_error: Option<DVector<f64>>,
}

/// Drives the robot along the curve tangent at `t`.
///
/// While the remaining path length exceeds the braking distance `v^2 / (2 |a|)` the field is the
/// tangent itself. Closer to the end the controller tracks the speed `sqrt(2 |a| d)` which stops
/// the robot at the end of the path, and the tangent is scaled by its output.
pub struct DriveField<'a> {
    t: f64,
    velocity: DVector<f64>,
    curve: &'a BezierCurve,
    controller: &'a mut dyn Controller<f64>,
    max_deceleration: f64,
}

/// Centripetal feedforward, `gain |v|^2 / |r'(t)|` along the principal normal at `t`.
///
/// Straight portions of the curve have no normal and the field is zero there.
pub struct CentripetalField<'a> {
    t: f64,
    velocity: DVector<f64>,
    curve: &'a BezierCurve,
    gain: f64,
}

/// Drives the orientation towards a target: the orientation error scaled by the controller
/// output.
pub struct RotationalField<'a> {
    target: RotationMatrix,
    controller: &'a mut dyn Controller<RotationMatrix>,
    last_error: Option<SkewSymmetricMatrix>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F: GuidingVectorField + ?Sized> GuidingVectorField for &mut F {
    type Output = F::Output;

    fn evaluate(&mut self, pose: &Pose) -> Result<Self::Output, GeomError> {
        (**self).evaluate(pose)
    }
}

impl<F: GuidingVectorField<Output = DVector<f64>>> EuclideanField for F {}

impl<A: EuclideanField, B: EuclideanField> GuidingVectorField for Sum<A, B> {
    type Output = DVector<f64>;

    fn evaluate(&mut self, pose: &Pose) -> Result<DVector<f64>, GeomError> {
        let a = self.a.evaluate(pose)?;
        let b = self.b.evaluate(pose)?;
        check_dim(a.len(), b.len())?;

        Ok(a + b)
    }
}

impl<F, O> GuidingVectorField for FnField<F>
where
    F: FnMut(&Pose) -> Result<O, GeomError>,
{
    type Output = O;

    fn evaluate(&mut self, pose: &Pose) -> Result<O, GeomError> {
        (self.0)(pose)
    }
}

impl<E, R> GuidingVectorField for Composed<E, R>
where
    E: EuclideanField,
    R: GuidingVectorField<Output = SkewSymmetricMatrix>,
{
    type Output = TangentBundle;

    fn evaluate(&mut self, pose: &Pose) -> Result<TangentBundle, GeomError> {
        let linear = self.euclidean.evaluate(pose)?;
        let angular = self.rotational.evaluate(pose)?;

        Ok(TangentBundle {
            twist: Twist::new(linear, angular)?,
            orientation: self.orientation.clone(),
        })
    }
}

impl TangentBundle {
    /// The commanded linear velocity.
    pub fn translational_component(&self) -> &DVector<f64> {
        &self.twist.linear
    }

    /// The commanded angular rate carried to the bundle's orientation, `R * W`.
    pub fn rotational_component(&self) -> Result<DMatrix<f64>, GeomError> {
        check_dim(self.orientation.dim(), self.twist.angular.dim())?;

        Ok(self.orientation.as_matrix() * self.twist.angular.as_matrix())
    }
}

impl<'a> TranslationalField<'a> {
    pub fn new(target: DVector<f64>, controller: &'a mut dyn Controller<DVector<f64>>) -> Self {
        Self {
            target,
            controller,
            last_error: None,
        }
    }

    /// The error `target - current` from the last evaluation.
    pub fn last_error(&self) -> Option<&DVector<f64>> {
        self.last_error.as_ref()
    }
}

impl<'a> GuidingVectorField for TranslationalField<'a> {
    type Output = DVector<f64>;

    fn evaluate(&mut self, pose: &Pose) -> Result<DVector<f64>, GeomError> {
        let current = &pose.position;
        check_dim(self.target.len(), current.len())?;

        let error = &self.target - current;
        self.last_error = Some(error.clone());

        let output = self.controller.drive_to_state(current, &self.target);

        match normalize(&error) {
            Ok(direction) => Ok(direction * output),
            Err(GeomError::ZeroVector) => Ok(DVector::zeros(current.len())),
            Err(e) => Err(e),
        }
    }
}

impl<'a> DriveField<'a> {
    pub fn new(
        t: f64,
        velocity: DVector<f64>,
        curve: &'a BezierCurve,
        controller: &'a mut dyn Controller<f64>,
        max_deceleration: f64,
    ) -> Self {
        Self {
            t,
            velocity,
            curve,
            controller,
            max_deceleration,
        }
    }
}

impl<'a> GuidingVectorField for DriveField<'a> {
    type Output = DVector<f64>;

    fn evaluate(&mut self, _pose: &Pose) -> Result<DVector<f64>, GeomError> {
        let tangent = self.curve.tangent(self.t);
        let along = project_onto(&self.velocity, &tangent).map_err(|e| match e {
            GeomError::ZeroVector => GeomError::ZeroDerivative { t: self.t },
            e => e,
        })?;

        let speed_sq = along.norm_squared();
        let decel = self.max_deceleration.abs();
        let braking_distance = speed_sq / (2.0 * decel);
        let remaining = self.curve.distance_remaining(self.t);

        if remaining > braking_distance {
            return Ok(tangent);
        }

        let target_speed = (2.0 * decel * remaining).sqrt();
        let output = self
            .controller
            .drive_to_state(&speed_sq.sqrt(), &target_speed);

        trace!(
            "Braking: {:.3} m remaining, target speed {:.3}, drive output {:.3}",
            remaining,
            target_speed,
            output
        );

        Ok(tangent * output)
    }
}

impl<'a> CentripetalField<'a> {
    pub fn new(t: f64, velocity: DVector<f64>, curve: &'a BezierCurve, gain: f64) -> Self {
        Self {
            t,
            velocity,
            curve,
            gain,
        }
    }
}

impl<'a> GuidingVectorField for CentripetalField<'a> {
    type Output = DVector<f64>;

    fn evaluate(&mut self, _pose: &Pose) -> Result<DVector<f64>, GeomError> {
        let zero = DVector::zeros(self.curve.dimension());

        if self.gain == 0.0 {
            return Ok(zero);
        }

        let normal = match self.curve.principal_normal(self.t) {
            Ok(n) => n,
            Err(GeomError::ZeroCurvature { .. }) => return Ok(zero),
            Err(e) => return Err(e),
        };

        // principal_normal has already rejected a vanishing derivative
        let deriv_norm = self.curve.derivative(self.t).norm().max(ZERO_VECTOR_EPS);

        Ok(normal * (self.gain * self.velocity.norm_squared() / deriv_norm))
    }
}

impl<'a> RotationalField<'a> {
    pub fn new(target: RotationMatrix, controller: &'a mut dyn Controller<RotationMatrix>) -> Self {
        Self {
            target,
            controller,
            last_error: None,
        }
    }

    /// The orientation error from the last evaluation.
    pub fn last_error(&self) -> Option<&SkewSymmetricMatrix> {
        self.last_error.as_ref()
    }
}

impl<'a> GuidingVectorField for RotationalField<'a> {
    type Output = SkewSymmetricMatrix;

    fn evaluate(&mut self, pose: &Pose) -> Result<SkewSymmetricMatrix, GeomError> {
        let error = lie::orientation_error(&pose.orientation, &self.target)?;
        self.last_error = Some(error.clone());

        let output = self
            .controller
            .drive_to_state(&pose.orientation, &self.target);

        Ok(error.scale(output))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compose a Euclidean field and a rotational field into one producing a [`TangentBundle`]
/// relative to `orientation`.
pub fn compose<E, R>(euclidean: E, rotational: R, orientation: RotationMatrix) -> Composed<E, R>
where
    E: EuclideanField,
    R: GuidingVectorField<Output = SkewSymmetricMatrix>,
{
    Composed {
        euclidean,
        rotational,
        orientation,
    }
}
