//! # Localisation module
//!
//! Provides the robot's pose and twist to trajectory control through the [`Localizer`] trait.
//! Real localisation systems live outside this crate, [`SimLoc`] is a perfect integrator of the
//! commands it is given and is used for simulation and testing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::DVector;
use serde::Serialize;

// Internal
use crate::geom::{check_dim, GeomError, RotationMatrix, SkewSymmetricMatrix};
use crate::traj_ctrl::TangentBundle;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of robot state.
///
/// `None` means the state is not currently available, for example because the localisation
/// system has not converged yet.
pub trait Localizer {
    /// The current pose of the robot.
    fn pose(&mut self) -> Option<Pose>;

    /// The current twist (linear and angular velocity) of the robot.
    fn twist(&mut self) -> Option<Twist>;

    /// The current linear velocity of the robot.
    fn velocity(&mut self) -> Option<DVector<f64>> {
        self.twist().map(|t| t.linear)
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The position and orientation of the robot in the world frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pose {
    pub position: DVector<f64>,
    pub orientation: RotationMatrix,
}

/// Linear velocity and angular rate of the robot, both in the world frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Twist {
    pub linear: DVector<f64>,
    pub angular: SkewSymmetricMatrix,
}

/// Simulated localisation which integrates the commanded twist exactly.
#[derive(Debug, Clone)]
pub struct SimLoc {
    pose: Pose,
    twist: Twist,

    /// If false the localiser reports no state, simulating a dropout.
    available: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, checking that the position and orientation dimensions agree.
    pub fn new(position: DVector<f64>, orientation: RotationMatrix) -> Result<Self, GeomError> {
        check_dim(orientation.dim(), position.len())?;

        Ok(Self {
            position,
            orientation,
        })
    }

    /// A pose at the origin with identity orientation.
    pub fn identity(dim: usize) -> Self {
        Self {
            position: DVector::zeros(dim),
            orientation: RotationMatrix::identity(dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }
}

impl Twist {
    /// A twist with no motion.
    pub fn zeros(dim: usize) -> Self {
        Self {
            linear: DVector::zeros(dim),
            angular: SkewSymmetricMatrix::zeros(dim),
        }
    }

    pub fn new(linear: DVector<f64>, angular: SkewSymmetricMatrix) -> Result<Self, GeomError> {
        check_dim(angular.dim(), linear.len())?;

        Ok(Self { linear, angular })
    }
}

impl SimLoc {
    /// Start the simulation at the given pose, at rest.
    pub fn new(pose: Pose) -> Self {
        let twist = Twist::zeros(pose.dim());

        Self {
            pose,
            twist,
            available: true,
        }
    }

    /// Advance the simulation by `dt` seconds executing the given command.
    ///
    /// The position moves along the commanded linear velocity, `p += v dt`, and the orientation
    /// rotates by the commanded angular rate, `R <- exp(W dt) R`.
    pub fn integrate(&mut self, command: &TangentBundle, dt: f64) -> Result<(), GeomError> {
        let twist = &command.twist;
        check_dim(self.pose.dim(), twist.linear.len())?;
        check_dim(self.pose.dim(), twist.angular.dim())?;

        self.pose.position += &twist.linear * dt;
        self.pose.orientation = twist
            .angular
            .scale(dt)
            .exp()
            .compose(&self.pose.orientation)?;
        self.twist = twist.clone();

        debug!(
            "SimLoc position {:?}, speed {:.4}",
            self.pose.position.as_slice(),
            self.twist.linear.norm()
        );

        Ok(())
    }

    /// Set whether the localiser reports any state.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Move the simulated robot, keeping the current twist.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

impl Localizer for SimLoc {
    fn pose(&mut self) -> Option<Pose> {
        if self.available {
            Some(self.pose.clone())
        } else {
            None
        }
    }

    fn twist(&mut self) -> Option<Twist> {
        if self.available {
            Some(self.twist.clone())
        } else {
            None
        }
    }
}
