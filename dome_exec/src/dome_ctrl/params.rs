//! Parameters structure for DomeCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::calib;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for dome control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Duration each rotation relay is energised for during the connect-time relay check, 0
    /// skips the check.
    ///
    /// Units: milliseconds
    pub relay_check_ms: f64,

    pub calib: calib::Params,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            relay_check_ms: 2000.0,
            calib: calib::Params::default(),
        }
    }
}
