//! # Trajectory controllers module
//!
//! This module provides the PID controllers used by the guiding vector fields, including the
//! functions which reduce a (current, target) pair of states to a scalar error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Internal
use super::Params;
use crate::geom::{lie, RotationMatrix};
use util::time::std_duration_to_seconds;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A feedback controller driving a state of type `T` towards a target.
pub trait Controller<T> {
    /// Get the control output which drives `current` towards `target`.
    fn drive_to_state(&mut self, current: &T, target: &T) -> f64;

    /// Clear any accumulated history (integral, previous error, previous time).
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Reduces a (current, target) pair to the scalar error fed to a PID controller.
pub type ErrorExtractor<T> = Box<dyn Fn(&T, &T) -> f64 + Send>;

/// PID gains.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Gains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// The controllers driving the follower's guiding vector fields.
pub struct TrajControllers {
    /// Position controller of the translational field
    pub translational: Box<dyn Controller<DVector<f64>> + Send>,

    /// Orientation controller of the rotational field
    pub rotational: Box<dyn Controller<RotationMatrix> + Send>,

    /// Speed controller of the drive field
    pub drive: Box<dyn Controller<f64> + Send>,
}

/// A PID controller
pub struct PidController<T> {
    gains: Gains,

    extractor: ErrorExtractor<T>,

    time_source: TimeSource,

    /// Previous instant that the error was passed in
    prev_time: Instant,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a PID controller measures the time between two calls.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TimeSource {
    /// Measure the wall clock.
    Wall,

    /// Assume every call is the given number of seconds after the previous one. Used for
    /// simulation and testing.
    Fixed(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gains {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    /// Proportional only gains.
    pub fn p(k_p: f64) -> Self {
        Self::new(k_p, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.k_p.is_finite() && self.k_i.is_finite() && self.k_d.is_finite()
    }
}

impl<T> PidController<T> {
    /// Create a new controller with the given gains and error extractor.
    pub fn new(gains: Gains, extractor: ErrorExtractor<T>, time_source: TimeSource) -> Self {
        Self {
            gains,
            extractor,
            time_source,
            prev_time: Instant::now(),
            prev_error: 0.0,
            integral: 0.0,
        }
    }

    /// Replace the gains. Accumulated history is kept.
    pub fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Get the controller output for the given error.
    ///
    /// This function is time-aware so there is no need to pass in a delta-time value.
    pub fn get(&mut self, error: f64) -> f64 {
        // Calculate dt
        let curr_time = Instant::now();
        let dt = match self.time_source {
            TimeSource::Wall => std_duration_to_seconds(curr_time - self.prev_time),
            TimeSource::Fixed(dt) => dt,
        };

        // If no time has passed there is no meaningful integral increment or derivative, so
        // neither is applied rather than dividing by zero.
        let deriv = if dt > 0.0 {
            self.integral += error * dt;
            (error - self.prev_error) / dt
        } else {
            trace!("PID called with non-positive dt ({}), skipping I and D terms", dt);
            0.0
        };

        let out = self.gains.k_p * error + self.gains.k_i * self.integral + self.gains.k_d * deriv;

        // Remember the previous error and time
        self.prev_error = error;
        self.prev_time = curr_time;

        out
    }
}

impl<T> Controller<T> for PidController<T> {
    fn drive_to_state(&mut self, current: &T, target: &T) -> f64 {
        let error = (self.extractor)(current, target);
        self.get(error)
    }

    fn reset(&mut self) {
        self.prev_time = Instant::now();
        self.prev_error = 0.0;
        self.integral = 0.0;
    }
}

impl TrajControllers {
    /// Create PID controllers with the standard error extractors from the parameters.
    pub fn new(params: &Params) -> Self {
        let time_source = params.time_source();

        Self {
            translational: Box::new(position_pid(params.translational_gains, time_source)),
            rotational: Box::new(orientation_pid(params.rotational_gains, time_source)),
            drive: Box::new(speed_pid(params.drive_gains, time_source)),
        }
    }

    /// Reset every controller.
    pub fn reset(&mut self) {
        self.translational.reset();
        self.rotational.reset();
        self.drive.reset();
    }
}

impl<T> std::fmt::Debug for PidController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PidController")
            .field("gains", &self.gains)
            .field("time_source", &self.time_source)
            .field("prev_error", &self.prev_error)
            .field("integral", &self.integral)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Euclidean distance between two positions.
///
/// Vectors of different dimension have no distance, `NaN` is returned.
pub fn position_error(current: &DVector<f64>, target: &DVector<f64>) -> f64 {
    if current.len() != target.len() {
        return std::f64::NAN;
    }

    (target - current).norm()
}

/// Signed speed error, positive when the target is faster than the current speed.
pub fn speed_error(current: &f64, target: &f64) -> f64 {
    target - current
}

/// Frobenius norm of the orientation error between two rotations.
pub fn orientation_error_norm(current: &RotationMatrix, target: &RotationMatrix) -> f64 {
    match lie::orientation_error(current, target) {
        Ok(e) => e.frobenius_norm(),
        Err(_) => std::f64::NAN,
    }
}

/// A PID controller on position using [`position_error`].
pub fn position_pid(gains: Gains, time_source: TimeSource) -> PidController<DVector<f64>> {
    PidController::new(gains, Box::new(position_error), time_source)
}

/// A PID controller on speed using [`speed_error`].
pub fn speed_pid(gains: Gains, time_source: TimeSource) -> PidController<f64> {
    PidController::new(gains, Box::new(speed_error), time_source)
}

/// A PID controller on orientation using [`orientation_error_norm`].
pub fn orientation_pid(gains: Gains, time_source: TimeSource) -> PidController<RotationMatrix> {
    PidController::new(gains, Box::new(orientation_error_norm), time_source)
}
