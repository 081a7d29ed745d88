//! Simulated path follower executable.
//!
//! # Architecture
//!
//! The executable runs the follower against a simulated localiser which executes every command
//! perfectly:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the scenario's path and starting pose
//!     - Main loop:
//!         - Trajectory control processing
//!         - Status report archiving
//!         - Simulation of the commanded twist
//!     - Save a JSON summary of the run into the session directory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use nalgebra::DVector;
use serde::Serialize;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use follow_lib::{
    geom::RotationMatrix,
    loc::{Pose, SimLoc},
    traj_ctrl::{heading, CommandBuffer, Follower, Params, Path, StatusReport},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(
    name = "follow_exec",
    about = "Follow a Bezier path with guiding vector fields in simulation"
)]
struct Opt {
    /// The parameter file, relative to the parameter directory.
    #[structopt(short, long, default_value = "follow.toml", parse(from_os_str))]
    params: PathBuf,

    /// Maximum number of cycles to simulate.
    #[structopt(short = "n", long, default_value = "600")]
    ticks: u64,

    /// Simulated period of one cycle in seconds.
    #[structopt(long, default_value = "0.05")]
    cycle_period_s: f64,

    /// Stop the simulation once all errors and rates are below this tolerance.
    #[structopt(long, default_value = "0.05")]
    tolerance: f64,

    /// Directory in which the session directory is created.
    #[structopt(long, default_value = "sessions", parse(from_os_str))]
    sessions_dir: PathBuf,

    /// Log debug messages.
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    scenario: Scenario,
}

/// The scenarios which can be simulated.
#[derive(Debug, Clone, Serialize, StructOpt)]
enum Scenario {
    /// A straight line along X with a constant heading, starting off the path.
    #[structopt(name = "line")]
    Line {
        /// Initial lateral offset from the path in meters.
        #[structopt(long, default_value = "0.5")]
        offset_m: f64,

        /// Initial heading error in radians.
        #[structopt(long, default_value = "0.3")]
        heading_rad: f64,
    },

    /// A planar arch with the heading following the tangent of the curve.
    #[structopt(name = "arch")]
    Arch,

    /// A spatial cubic with the heading rotating about Z along the path.
    #[structopt(name = "spatial")]
    Spatial {
        /// Rotation about Z at the end of the path in radians.
        #[structopt(long, default_value = "0.8")]
        end_yaw_rad: f64,
    },
}

/// Summary of a run, saved into the session directory.
#[derive(Debug, Serialize)]
struct Summary {
    scenario: Scenario,
    params: Params,
    cycles: u64,
    converged: bool,
    final_report: StatusReport,
    final_pose: Option<Pose>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("follow_exec", &opt.sessions_dir).wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logger_init(log_level, Some(&session)).wrap_err("Failed to initialise logging")?;

    info!("Guiding Vector Field Path Follower\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: Params =
        util::params::load(&opt.params).wrap_err("Could not load follower params")?;

    // The simulation advances by a fixed period, so the controllers must too
    if params.fixed_cycle_period_s != Some(opt.cycle_period_s) {
        info!(
            "Overriding controller cycle period with the simulation period ({} s)",
            opt.cycle_period_s
        );
        params.fixed_cycle_period_s = Some(opt.cycle_period_s);
    }

    info!("Follower parameters loaded");

    // ---- INITIALISE MODULES ----

    let (path, start_pose) = build_scenario(&opt.scenario).wrap_err("Invalid scenario")?;

    let mut follower =
        Follower::from_params(SimLoc::new(start_pose), CommandBuffer::new(), params.clone())
            .wrap_err("Failed to initialise the follower")?;

    let mut archiver = Archiver::from_path(&session, "follow_status.csv")
        .wrap_err("Failed to create the status archive")?;

    info!("Initialisation complete, running {:?}\n", opt.scenario);

    // ---- MAIN LOOP ----

    follower.follow(path);

    let mut cycles = 0;
    let mut converged = false;

    while cycles < opt.ticks {
        follower
            .update()
            .wrap_err_with(|| format!("Trajectory control failed in cycle {}", cycles))?;
        cycles += 1;

        archiver
            .serialise(follower.report())
            .wrap_err("Failed to archive the status report")?;

        match follower.sink_mut().take() {
            Some(cmd) => follower
                .localizer_mut()
                .integrate(&cmd, opt.cycle_period_s)
                .wrap_err("Failed to simulate the command")?,
            None => return Err(eyre!("No command issued in cycle {}", cycles)),
        }

        if follower.report().converged(opt.tolerance) {
            converged = true;
            break;
        }
    }

    let final_report = *follower.report();
    let final_pose = follower.previous_pose().cloned();
    follower.break_following();

    if converged {
        info!("Converged onto the end of the path after {} cycles", cycles);
    } else {
        warn!(
            "Not converged after {} cycles: translational error {:.4} m, rotational error {:.4}, \
             speed {:.4} m/s",
            cycles,
            final_report.translational_error_m,
            final_report.rotational_error,
            final_report.speed_ms
        );
    }

    // ---- SHUTDOWN ----

    session
        .save_json(
            "summary.json",
            &Summary {
                scenario: opt.scenario,
                params,
                cycles,
                converged,
                final_report,
                final_pose,
            },
        )
        .wrap_err("Failed to save the run summary")?;

    info!("End of execution");

    Ok(())
}

/// Build the path and starting pose of a scenario.
fn build_scenario(scenario: &Scenario) -> Result<(Path, Pose), Report> {
    let v2 = |x: f64, y: f64| DVector::from_vec(vec![x, y]);
    let v3 = |x: f64, y: f64, z: f64| DVector::from_vec(vec![x, y, z]);

    let scenario = match *scenario {
        Scenario::Line {
            offset_m,
            heading_rad,
        } => (
            Path::new(
                vec![v2(0.0, 0.0), v2(1.0, 0.0), v2(2.0, 0.0)],
                heading::constant(RotationMatrix::identity(2)),
            )?,
            Pose::new(v2(0.0, offset_m), RotationMatrix::from_2d_angle(heading_rad))?,
        ),
        Scenario::Arch => (
            Path::new(
                vec![v2(0.0, 0.0), v2(1.0, 1.0), v2(2.0, 0.0)],
                heading::tangent_2d(),
            )?,
            Pose::new(v2(0.0, -0.2), RotationMatrix::from_2d_angle(0.7))?,
        ),
        Scenario::Spatial { end_yaw_rad } => (
            Path::new(
                vec![
                    v3(0.0, 0.0, 0.0),
                    v3(0.0, 0.0, 1.0),
                    v3(0.0, 1.0, 1.0),
                    v3(1.0, 1.0, 1.0),
                ],
                heading::linear(
                    &RotationMatrix::identity(3),
                    &RotationMatrix::from_3d_rotation_z(end_yaw_rad),
                )?,
            )?,
            Pose::new(v3(0.2, -0.2, 0.0), RotationMatrix::from_3d_rotation_x(0.1))?,
        ),
    };

    Ok(scenario)
}
