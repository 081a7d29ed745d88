//! Closed loop tests of the follower against the simulated localiser.

use follow_lib::{
    geom::RotationMatrix,
    loc::{Localizer, Pose, SimLoc},
    traj_ctrl::{heading, CommandBuffer, FollowError, Follower, Gains, Params, Path},
};
use nalgebra::DVector;

const CYCLE_PERIOD_S: f64 = 0.01;

fn pt(x: f64, y: f64) -> DVector<f64> {
    DVector::from_vec(vec![x, y])
}

fn params() -> Params {
    Params {
        translational_gains: Gains::p(1.0),
        rotational_gains: Gains::p(2.0),
        drive_gains: Gains::p(0.25),
        centripetal_gain: 0.005,
        max_deceleration_mss: 4.0,
        fixed_cycle_period_s: Some(CYCLE_PERIOD_S),
    }
}

fn sim_follower(start: Pose) -> Follower<SimLoc, CommandBuffer> {
    Follower::from_params(SimLoc::new(start), CommandBuffer::new(), params()).unwrap()
}

/// Run one cycle of control and simulation.
fn step(follower: &mut Follower<SimLoc, CommandBuffer>) -> Result<(), FollowError> {
    follower.update()?;

    if let Some(cmd) = follower.sink_mut().take() {
        follower.localizer_mut().integrate(&cmd, CYCLE_PERIOD_S)?;
    }

    Ok(())
}

#[test]
fn test_follow_straight_line() {
    let path = Path::new(
        vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)],
        heading::constant(RotationMatrix::identity(2)),
    )
    .unwrap();

    let start = Pose::new(pt(0.0, 0.5), RotationMatrix::from_2d_angle(0.3)).unwrap();
    let mut follower = sim_follower(start);
    follower.follow(path);

    let mut max_lateral: f64 = 0.0;
    for _ in 0..1500 {
        step(&mut follower).unwrap();
        max_lateral = max_lateral.max(follower.previous_pose().unwrap().position[1].abs());
    }

    // Never moves further from the line than where it started
    assert!(max_lateral <= 0.5 + 1e-9);

    let trans_err = follower.previous_translational_error().unwrap();
    let rot_err = follower.previous_rotational_error().unwrap();
    assert!(trans_err.norm() < 0.1, "translational error {}", trans_err.norm());
    assert!(
        rot_err.frobenius_norm() < 0.1,
        "rotational error {}",
        rot_err.frobenius_norm()
    );

    // Stopped around the end of the path
    let pose = follower.localizer_mut().pose().unwrap();
    assert!((pose.position[0] - 2.0).abs() < 0.1);
    assert!(pose.position[1].abs() < 1e-3);

    let report = follower.report();
    assert_eq!(report.tick, 1499);
    assert!(report.t > 0.95);
    assert!(report.distance_remaining_m < 0.1);
}

#[test]
fn test_follow_with_large_heading_error() {
    let path = Path::new(
        vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(2.0, 0.0)],
        heading::constant(RotationMatrix::identity(2)),
    )
    .unwrap();

    let start = Pose::new(pt(0.0, 0.3), RotationMatrix::from_2d_angle(1.6)).unwrap();
    let mut follower = sim_follower(start);
    follower.follow(path);

    step(&mut follower).unwrap();

    // The error is the true angle and the command stays proportionate to it
    let report = *follower.report();
    assert!((report.rotational_error - 1.6 * 2f64.sqrt()).abs() < 1e-6);
    assert!(report.cmd_angular_rate.is_finite());
    assert!(report.cmd_angular_rate < 20.0, "angular rate {}", report.cmd_angular_rate);

    let rot_err = follower.previous_rotational_error().unwrap();
    assert!((rot_err.get(1, 0).unwrap() + 1.6).abs() < 1e-6);

    for _ in 1..1500 {
        step(&mut follower).unwrap();
    }

    let heading = follower.localizer_mut().pose().unwrap().orientation.angle_2d().unwrap();
    assert!(heading.abs() < 0.1, "heading {}", heading);
    assert!(follower.report().rotational_error < 0.1);
    assert!(follower.report().translational_error_m < 0.1);
}

#[test]
fn test_follow_arch_with_tangent_heading() {
    let path = Path::new(
        vec![pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 0.0)],
        heading::tangent_2d(),
    )
    .unwrap();

    let start = Pose::new(pt(0.0, -0.2), RotationMatrix::from_2d_angle(0.7)).unwrap();
    let mut follower = sim_follower(start);
    follower.follow(path);

    for _ in 0..1500 {
        step(&mut follower).unwrap();
    }

    let trans_err = follower.previous_translational_error().unwrap();
    assert!(trans_err.norm() < 0.1, "translational error {}", trans_err.norm());
    assert!(follower.report().rotational_error < 0.2);

    let pose = follower.localizer_mut().pose().unwrap();
    assert!((pose.position - pt(2.0, 0.0)).norm() < 0.15);
}

#[test]
fn test_localiser_dropout_recovers() {
    let path = Path::new(
        vec![pt(0.0, 0.0), pt(2.0, 0.0)],
        heading::constant(RotationMatrix::identity(2)),
    )
    .unwrap();

    let mut follower = sim_follower(Pose::new(pt(0.0, 0.2), RotationMatrix::identity(2)).unwrap());
    follower.follow(path);

    for _ in 0..10 {
        step(&mut follower).unwrap();
    }
    let pose_before = follower.previous_pose().cloned().unwrap();

    follower.localizer_mut().set_available(false);
    assert!(matches!(step(&mut follower), Err(FollowError::NoPose)));

    // Diagnostics are those of the last successful cycle
    assert_eq!(follower.previous_pose(), Some(&pose_before));
    assert_eq!(follower.report().tick, 9);

    follower.localizer_mut().set_available(true);
    step(&mut follower).unwrap();
    assert_eq!(follower.report().tick, 10);
}
