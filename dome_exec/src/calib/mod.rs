//! # Calibration module
//!
//! Measures the dome's rotation constants by driving it through full revolutions and watching the
//! home and impulse sensors. See [`calibrate`] for the procedure.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod engine;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use engine::{calibrate, find_home};
pub use params::Params;

use crate::hal::{HwError, SensorId};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Measured rotation constants of the dome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibConsts {
    /// Number of impulse pulses in one full revolution.
    pub impulses_per_rev: u32,

    /// Units: degrees/millisecond
    pub speed_cw_deg_ms: f64,

    /// Units: degrees/millisecond
    pub speed_ccw_deg_ms: f64,

    /// Angle from the home entry point (azimuth 0) to the first impulse rising edge when rotating
    /// clockwise.
    ///
    /// Units: degrees
    pub home_to_impulse_offset_deg: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised during calibration or homing.
#[derive(Debug, thiserror::Error)]
pub enum CalibError {
    #[error("Hardware fault during calibration: {0}")]
    Hardware(#[from] HwError),

    #[error("Timed out after {timeout_s} s waiting for the {sensor:?} sensor to read {level}")]
    SensorStall {
        sensor: SensorId,
        level: bool,
        timeout_s: f64,
    },

    #[error("No impulse edges were seen during a full revolution")]
    NoImpulses,

    #[error(
        "Calibration still inconsistent after {attempts} attempt(s): offset {offset_deg:.3} deg \
        is not smaller than the impulse step {step_deg:.3} deg"
    )]
    Inconsistent {
        attempts: u32,
        offset_deg: f64,
        step_deg: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CalibConsts {
    /// Angle between two consecutive impulse rising edges.
    ///
    /// Units: degrees
    pub fn step_deg(&self) -> f64 {
        360.0 / self.impulses_per_rev as f64
    }

    /// Check the constants describe a usable dome: at least one impulse, positive speeds, and an
    /// offset which lies within the first impulse step.
    pub fn is_consistent(&self) -> bool {
        self.impulses_per_rev > 0
            && self.speed_cw_deg_ms > 0.0
            && self.speed_ccw_deg_ms > 0.0
            && self.home_to_impulse_offset_deg >= 0.0
            && self.home_to_impulse_offset_deg < self.step_deg()
    }
}
