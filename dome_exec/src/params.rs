//! # Dome Executable Parameters
//!
//! This module provide parameters for the dome executable, loaded from `dome_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    dome_ctrl,
    hal::{sim::SimParams, GpioParams},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Parameter file holding the executable's parameters.
pub const EXEC_PARAMS_FILE: &str = "dome_exec.toml";

/// Parameter file holding the network endpoints.
pub const NET_PARAMS_FILE: &str = "net.toml";

/// Parameter file the calibration constants are persisted to.
pub const CALIB_FILE: &str = "dome_calib.toml";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomeExecParams {
    /// Target period of one cycle.
    ///
    /// Units: milliseconds
    pub tick_period_ms: f64,

    /// Telemetry is published once every this many cycles.
    pub tm_every_n_ticks: u64,

    pub ctrl: dome_ctrl::Params,

    pub gpio: GpioParams,

    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DomeExecParams {
    fn default() -> Self {
        Self {
            tick_period_ms: 10.0,
            tm_every_n_ticks: 10,
            ctrl: dome_ctrl::Params::default(),
            gpio: GpioParams::default(),
            sim: SimParams::default(),
        }
    }
}
