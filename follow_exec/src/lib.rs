//! # Path follower library.
//!
//! Drives a rigid body along a Bezier trajectory while tracking a heading, by composing guiding
//! vector fields into a single twist command once per control tick.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry - polynomials, rotation group operators and Bezier curves
pub mod geom;

/// Localisation interface - poses, twists and the simulated localiser
pub mod loc;

/// Trajectory control module - keeps the robot on the given path
pub mod traj_ctrl;
