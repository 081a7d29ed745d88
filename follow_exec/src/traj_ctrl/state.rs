//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use nalgebra::DVector;
use serde::Serialize;

// Internal
use super::*;
use crate::geom::{GeomError, SkewSymmetricMatrix};
use crate::loc::{Localizer, Pose, Twist};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Receives the commands produced by the follower, typically by driving the robot's actuators.
pub trait CommandSink {
    fn dispatch(&mut self, command: &TangentBundle);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follows a [`Path`] by evaluating the composite guiding vector field once per `update`.
pub struct Follower<L: Localizer, S: CommandSink> {
    params: Params,

    /// Executing mode
    mode: FollowerMode,

    localizer: L,
    sink: S,

    /// The path being followed, `Some` while in `Following` mode.
    path: Option<Path>,

    /// Controller objects used by the guiding vector fields
    controllers: TrajControllers,

    /// Number of cycles processed since the last call to `follow`
    tick: u64,

    previous_pose: Option<Pose>,
    previous_velocity: Option<Twist>,
    previous_translational_error: Option<DVector<f64>>,
    previous_rotational_error: Option<SkewSymmetricMatrix>,
    report: StatusReport,
}

/// The status report containing monitoring quantities of the last cycle.
///
/// All fields are scalars so that reports can be archived as CSV rows.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Cycle number since the path was loaded
    pub tick: u64,

    /// Curve parameter of the closest point on the path
    pub t: f64,

    /// Path length between the closest point and the end of the path
    pub distance_remaining_m: f64,

    /// Distance to the closest point on the path
    pub translational_error_m: f64,

    /// Frobenius norm of the orientation error to the target heading
    pub rotational_error: f64,

    /// Current speed reported by the localiser
    pub speed_ms: f64,

    /// Frobenius norm of the current angular rate reported by the localiser
    pub angular_rate: f64,

    /// Commanded speed
    pub cmd_speed_ms: f64,

    /// Frobenius norm of the commanded angular rate
    pub cmd_angular_rate: f64,
}

/// A sink which keeps the most recent command until it is taken.
#[derive(Debug, Default, Clone)]
pub struct CommandBuffer {
    latest: Option<TangentBundle>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of execution of the follower.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FollowerMode {
    /// No path, `update` does nothing.
    Idle,

    /// A path is loaded and commands are issued on every `update`.
    Following,
}

/// Potential errors that can occur during processing of the follower.
#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("The localiser did not provide a pose")]
    NoPose,

    #[error("The localiser did not provide a twist")]
    NoTwist,

    #[error("In Following mode without a path")]
    NoPath,

    #[error("Invalid follower parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Geometry error: {0}")]
    Geom(#[from] GeomError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F: FnMut(&TangentBundle)> CommandSink for F {
    fn dispatch(&mut self, command: &TangentBundle) {
        self(command)
    }
}

impl CommandSink for CommandBuffer {
    fn dispatch(&mut self, command: &TangentBundle) {
        self.latest = Some(command.clone());
    }
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the most recent command, leaving the buffer empty.
    pub fn take(&mut self) -> Option<TangentBundle> {
        self.latest.take()
    }

    pub fn latest(&self) -> Option<&TangentBundle> {
        self.latest.as_ref()
    }
}

impl StatusReport {
    /// True if the robot is on the path, at the target heading and at rest, all within `tol`.
    pub fn converged(&self, tol: f64) -> bool {
        self.translational_error_m < tol
            && self.rotational_error < tol
            && self.speed_ms < tol
            && self.angular_rate < tol
    }
}

impl<L: Localizer, S: CommandSink> Follower<L, S> {
    /// Create a new follower in `Idle` mode using the given controllers.
    pub fn new(
        localizer: L,
        sink: S,
        controllers: TrajControllers,
        params: Params,
    ) -> Result<Self, FollowError> {
        params.validate()?;

        Ok(Self {
            params,
            mode: FollowerMode::Idle,
            localizer,
            sink,
            path: None,
            controllers,
            tick: 0,
            previous_pose: None,
            previous_velocity: None,
            previous_translational_error: None,
            previous_rotational_error: None,
            report: StatusReport::default(),
        })
    }

    /// Create a new follower with PID controllers built from the parameters.
    pub fn from_params(localizer: L, sink: S, params: Params) -> Result<Self, FollowError> {
        let controllers = TrajControllers::new(&params);
        Self::new(localizer, sink, controllers, params)
    }

    /// Begin following a path.
    ///
    /// Any path currently being followed is replaced. The controllers are reset so that no
    /// history carries over from the previous path.
    pub fn follow(&mut self, path: Path) {
        info!(
            "Following new path of degree {} ({:.3} m long)",
            path.curve().degree(),
            path.curve().length()
        );

        self.path = Some(path);
        self.tick = 0;
        self.controllers.reset();
        self.mode = FollowerMode::Following;
    }

    /// Stop following the current path.
    ///
    /// No further commands are issued. The last diagnostics remain readable.
    pub fn break_following(&mut self) {
        if self.mode == FollowerMode::Following {
            info!("Path following interrupted after {} cycles", self.tick);
        }

        self.path = None;
        self.controllers.reset();
        self.mode = FollowerMode::Idle;
    }

    /// Process one cycle of trajectory control.
    ///
    /// In `Following` mode this reads the localiser, evaluates the guiding vector field at the
    /// current pose and dispatches the command to the sink. In `Idle` mode nothing happens.
    pub fn update(&mut self) -> Result<(), FollowError> {
        match self.mode {
            FollowerMode::Idle => self.mode_idle(),
            FollowerMode::Following => self.mode_following(),
        }
    }

    /// Mode idle.
    ///
    /// No actions are taken in this mode. To move to `Following` the user must call `follow`.
    fn mode_idle(&mut self) -> Result<(), FollowError> {
        Ok(())
    }

    /// Mode following.
    fn mode_following(&mut self) -> Result<(), FollowError> {
        // Validate path
        let path = match self.path {
            Some(ref p) => p,
            None => return Err(FollowError::NoPath),
        };

        // Get the robot state
        let pose = self.localizer.pose().ok_or(FollowError::NoPose)?;
        let twist = self.localizer.twist().ok_or(FollowError::NoTwist)?;
        let velocity = self.localizer.velocity().ok_or(FollowError::NoTwist)?;

        // ---- TARGET ----

        let t = path.closest_t(&pose.position)?;
        let target = path.pose(t)?;
        let curve = path.curve();

        // ---- COMMAND GENERATION ----

        let mut translational = TranslationalField::new(
            target.position.clone(),
            &mut *self.controllers.translational,
        );
        let mut rotational =
            RotationalField::new(target.orientation.clone(), &mut *self.controllers.rotational);
        let drive = DriveField::new(
            t,
            velocity.clone(),
            curve,
            &mut *self.controllers.drive,
            self.params.max_deceleration_mss,
        );
        let centripetal = CentripetalField::new(t, velocity, curve, self.params.centripetal_gain);

        let command = compose(
            (&mut translational).add(drive).add(centripetal),
            &mut rotational,
            pose.orientation.clone(),
        )
        .evaluate(&pose)?;

        // ---- DIAGNOSTICS ----

        let translational_error = translational
            .last_error()
            .cloned()
            .unwrap_or_else(|| DVector::zeros(pose.dim()));
        let rotational_error = rotational
            .last_error()
            .cloned()
            .unwrap_or_else(|| SkewSymmetricMatrix::zeros(pose.dim()));

        self.report = StatusReport {
            tick: self.tick,
            t,
            distance_remaining_m: curve.distance_remaining(t),
            translational_error_m: translational_error.norm(),
            rotational_error: rotational_error.frobenius_norm(),
            speed_ms: twist.linear.norm(),
            angular_rate: twist.angular.frobenius_norm(),
            cmd_speed_ms: command.twist.linear.norm(),
            cmd_angular_rate: command.twist.angular.frobenius_norm(),
        };

        debug!(
            "TrajCtrl tick {}: t = {:.4}, trans err = {:.4} m, rot err = {:.4}, cmd speed = {:.4}",
            self.report.tick,
            self.report.t,
            self.report.translational_error_m,
            self.report.rotational_error,
            self.report.cmd_speed_ms
        );

        self.previous_pose = Some(pose);
        self.previous_velocity = Some(twist);
        self.previous_translational_error = Some(translational_error);
        self.previous_rotational_error = Some(rotational_error);
        self.tick += 1;

        self.sink.dispatch(&command);

        Ok(())
    }

    pub fn mode(&self) -> FollowerMode {
        self.mode
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The path currently being followed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// The status report of the last processed cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// The pose read from the localiser in the last processed cycle.
    pub fn previous_pose(&self) -> Option<&Pose> {
        self.previous_pose.as_ref()
    }

    /// The twist read from the localiser in the last processed cycle.
    pub fn previous_velocity(&self) -> Option<&Twist> {
        self.previous_velocity.as_ref()
    }

    /// The error from the robot to the closest point on the path in the last processed cycle.
    pub fn previous_translational_error(&self) -> Option<&DVector<f64>> {
        self.previous_translational_error.as_ref()
    }

    /// The orientation error to the target heading in the last processed cycle.
    pub fn previous_rotational_error(&self) -> Option<&SkewSymmetricMatrix> {
        self.previous_rotational_error.as_ref()
    }

    pub fn localizer(&self) -> &L {
        &self.localizer
    }

    pub fn localizer_mut(&mut self) -> &mut L {
        &mut self.localizer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::RotationMatrix;
    use crate::loc::SimLoc;

    fn pt(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    fn test_params() -> Params {
        Params {
            translational_gains: Gains::p(1.0),
            rotational_gains: Gains::p(2.0),
            drive_gains: Gains::p(0.25),
            centripetal_gain: 0.005,
            max_deceleration_mss: 4.0,
            fixed_cycle_period_s: Some(0.05),
        }
    }

    fn line_path() -> Path {
        Path::new(
            vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)],
            heading::constant(RotationMatrix::identity(2)),
        )
        .unwrap()
    }

    fn start_pose() -> Pose {
        Pose::new(pt(0.0, 0.5), RotationMatrix::from_2d_angle(0.3)).unwrap()
    }

    #[test]
    fn test_idle_does_nothing() {
        let mut count = 0;
        let mut follower = Follower::from_params(
            SimLoc::new(start_pose()),
            |_: &TangentBundle| count += 1,
            test_params(),
        )
        .unwrap();

        assert_eq!(follower.mode(), FollowerMode::Idle);
        follower.update().unwrap();
        assert!(follower.previous_pose().is_none());
        assert!(follower.path().is_none());

        drop(follower);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_single_update() {
        let mut follower =
            Follower::from_params(SimLoc::new(start_pose()), CommandBuffer::new(), test_params())
                .unwrap();

        follower.follow(line_path());
        assert_eq!(follower.mode(), FollowerMode::Following);
        follower.update().unwrap();

        // Closest point is the start of the path, directly below the robot
        let err = follower.previous_translational_error().unwrap();
        assert!(err[0].abs() < 1e-5);
        assert!((err[1] + 0.5).abs() < 1e-9);

        let rot_err = follower.previous_rotational_error().unwrap();
        assert!((rot_err.get(1, 0).unwrap() + 0.3).abs() < 1e-8);

        let report = *follower.report();
        assert_eq!(report.tick, 0);
        assert!((report.translational_error_m - 0.5).abs() < 1e-5);
        assert!((report.distance_remaining_m - 2.0).abs() < 1e-5);
        assert!(!report.converged(0.1));

        // Drive along the tangent (2, 0) and pull back towards the line
        let cmd = follower.sink_mut().take().unwrap();
        assert!((cmd.twist.linear[0] - 2.0).abs() < 1e-5);
        assert!((cmd.twist.linear[1] + 0.5).abs() < 1e-9);
        assert!(cmd.twist.angular.get(1, 0).unwrap() < 0.0);
        assert_eq!(cmd.orientation, start_pose().orientation);
    }

    #[test]
    fn test_missing_state() {
        let mut follower =
            Follower::from_params(SimLoc::new(start_pose()), CommandBuffer::new(), test_params())
                .unwrap();
        follower.follow(line_path());
        follower.localizer_mut().set_available(false);

        assert!(matches!(follower.update(), Err(FollowError::NoPose)));
        assert!(follower.sink().latest().is_none());
    }

    #[test]
    fn test_geometry_error_propagates() {
        let mut follower = Follower::from_params(
            SimLoc::new(Pose::identity(3)),
            CommandBuffer::new(),
            test_params(),
        )
        .unwrap();
        follower.follow(line_path());

        assert!(matches!(
            follower.update(),
            Err(FollowError::Geom(GeomError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_break_following() {
        let mut follower =
            Follower::from_params(SimLoc::new(start_pose()), CommandBuffer::new(), test_params())
                .unwrap();
        follower.follow(line_path());
        follower.update().unwrap();
        follower.sink_mut().take();

        follower.break_following();
        assert_eq!(follower.mode(), FollowerMode::Idle);
        follower.update().unwrap();
        assert!(follower.sink().latest().is_none());

        // Diagnostics of the last cycle are kept
        assert!(follower.previous_pose().is_some());
    }

    #[test]
    fn test_invalid_params() {
        let mut params = test_params();
        params.max_deceleration_mss = 0.0;

        assert!(matches!(
            Follower::from_params(SimLoc::new(start_pose()), CommandBuffer::new(), params),
            Err(FollowError::InvalidParams(_))
        ));
    }
}
