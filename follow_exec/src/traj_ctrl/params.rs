//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::{Gains, TimeSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Params {
    /// Gains of the position controller driving the translational field
    pub translational_gains: Gains,

    /// Gains of the orientation controller driving the rotational field
    pub rotational_gains: Gains,

    /// Gains of the speed controller used while braking at the end of the path
    pub drive_gains: Gains,

    /// Centripetal feedforward gain
    pub centripetal_gain: f64,

    /// Maximum deceleration magnitude of the robot in m/s^2. The sign is ignored.
    pub max_deceleration_mss: f64,

    /// If set the controllers assume this fixed period between updates instead of measuring
    /// the wall clock.
    #[serde(default)]
    pub fixed_cycle_period_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a parameter set is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("The {0} gains must all be finite")]
    NonFiniteGains(&'static str),

    #[error("The centripetal gain must be finite, found {0}")]
    NonFiniteCentripetalGain(f64),

    #[error("The maximum deceleration must be finite and non-zero, found {0}")]
    InvalidDeceleration(f64),

    #[error("The fixed cycle period must be finite and positive, found {0}")]
    InvalidCyclePeriod(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters can be used to build a follower.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, gains) in [
            ("translational", &self.translational_gains),
            ("rotational", &self.rotational_gains),
            ("drive", &self.drive_gains),
        ]
        .iter()
        {
            if !gains.is_finite() {
                return Err(ParamsError::NonFiniteGains(*name));
            }
        }

        if !self.centripetal_gain.is_finite() {
            return Err(ParamsError::NonFiniteCentripetalGain(self.centripetal_gain));
        }

        if !self.max_deceleration_mss.is_finite() || self.max_deceleration_mss == 0.0 {
            return Err(ParamsError::InvalidDeceleration(self.max_deceleration_mss));
        }

        if let Some(dt) = self.fixed_cycle_period_s {
            if !dt.is_finite() || dt <= 0.0 {
                return Err(ParamsError::InvalidCyclePeriod(dt));
            }
        }

        Ok(())
    }

    /// The time source the controllers should use.
    pub fn time_source(&self) -> TimeSource {
        match self.fixed_cycle_period_s {
            Some(dt) => TimeSource::Fixed(dt),
            None => TimeSource::Wall,
        }
    }
}
