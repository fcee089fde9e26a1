//! # Shutter control module
//!
//! State machine driving the shutter between its limit switches. Like position tracking the
//! module is pure: commands and cycles return a [`ShutterDemand`] which the caller applies to the
//! actuators.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutterState {
    Open,
    Opening,
    Stopped,
    Closing,
    Closed,
}

/// Actuator command the shutter needs this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterDemand {
    Open,
    Close,
    Stop,
}

/// Result of a shutter command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdOutcome {
    /// The shutter is already in the requested state, nothing needs to be written.
    AlreadySatisfied,

    /// The shutter has started moving, the demand must be applied now.
    InProgress(ShutterDemand),
}

impl Default for ShutterState {
    fn default() -> Self {
        ShutterState::Stopped
    }
}
