//! # Position tracking module
//!
//! Dead-reckons the dome's azimuth from the commanded rotation direction and the calibrated
//! speeds, and corrects it on sensor edges:
//!
//! - an impulse rising edge while rotating clockwise, or falling edge while rotating
//!   counter-clockwise, snaps the azimuth onto the predicted impulse position,
//! - a home rising edge snaps the azimuth to exactly 0.
//!
//! The tracker never touches the hardware. When a target is set each cycle produces a rotation
//! demand, which the caller applies in the same cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during PosTrack operation.
#[derive(Debug, thiserror::Error)]
pub enum PosTrackError {
    #[error("The position tracker has not been seeded with calibration constants")]
    NotInitialised,

    #[error("Cannot track position with inconsistent calibration constants: {0:?}")]
    InvalidConsts(crate::calib::CalibConsts),
}
