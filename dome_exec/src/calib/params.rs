//! Parameters structure for the calibration engine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for calibration and homing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Interval between sensor polls while waiting for a transition.
    ///
    /// Units: milliseconds
    pub poll_period_ms: f64,

    /// Longest time any single wait may take before the sensor is declared
    /// stalled. Must be longer than one revolution at the slowest speed.
    ///
    /// Units: seconds
    pub stall_timeout_s: f64,

    /// Time to keep rotating past home before reversing.
    ///
    /// Units: milliseconds
    pub overshoot_ms: f64,

    /// Number of times an inconsistent calibration is restarted before giving
    /// up.
    pub max_attempts: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            poll_period_ms: 1.0,
            stall_timeout_s: 300.0,
            overshoot_ms: 1000.0,
            max_attempts: 3,
        }
    }
}
