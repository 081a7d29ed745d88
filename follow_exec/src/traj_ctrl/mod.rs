//! # Trajectory control module
//!
//! Trajectory control keeps the robot on a target [`Path`] by evaluating a composite guiding
//! vector field at the current pose every cycle. The path is a Bezier curve with a heading
//! interpolation function; the closest point on the curve to the robot gives the target pose.
//!
//! The field is the sum of three Euclidean components and a rotational one:
//!
//! - the translational field corrects the error to the closest point,
//! - the drive field moves the robot along the curve and brakes it to a stop at the end,
//! - the centripetal field feeds forward the acceleration needed to follow curvature,
//! - the rotational field corrects the orientation error.
//!
//! Each component with feedback is driven by its own PID controller. The resulting command is
//! handed to a [`CommandSink`] and the [`Follower`] records diagnostics of the cycle in a
//! [`StatusReport`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod fields;
pub mod params;
pub mod path;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use fields::*;
pub use params::{Params, ParamsError};
pub use path::{heading, CurveContext, HeadingInterpolation, Path};
pub use state::*;
