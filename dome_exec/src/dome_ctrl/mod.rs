//! # Dome control module
//!
//! The dome controller owns the actuators, the position tracker and the shutter state machine,
//! and exposes them to the host through the [`DomeDriver`] capability interface.
//!
//! All commands and the cyclic [`DomeDriver::tick`] take `&mut self`. The controller is owned by
//! the main loop and never shared, so commands and ticks can not interleave.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod tm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::{DomeDirection, MotionCmd, ShutterOp};

pub use params::*;
pub use state::*;
pub use tm::*;

use crate::{
    calib::{CalibConsts, CalibError},
    hal::HwError,
    pos_track::PosTrackError,
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Operations the host can perform on a dome.
pub trait DomeDriver {
    /// Bring the dome into service: stop all outputs, optionally exercise the rotation relays,
    /// read the shutter state, then calibrate (or home when constants are already known) and
    /// seed the position estimate.
    ///
    /// On failure all outputs are stopped and the dome stays disconnected.
    fn connect(&mut self) -> Result<(), DomeError>;

    /// Stop all outputs and take the dome out of service.
    fn disconnect(&mut self) -> Result<(), DomeError>;

    /// Periodic processing, called once per cycle.
    fn tick(&mut self) -> Result<(), DomeError>;

    /// Rotate by `delta_deg` from the current azimuth estimate, positive is clockwise.
    fn move_rel(&mut self, delta_deg: f64) -> Result<CmdState, DomeError>;

    /// Rotate to an absolute azimuth. Any active target is replaced.
    fn move_abs(&mut self, az_deg: f64) -> Result<CmdState, DomeError>;

    /// Start or stop continuous rotation. Either clears any active target.
    fn move_dir(&mut self, dir: DomeDirection, cmd: MotionCmd) -> Result<CmdState, DomeError>;

    fn control_shutter(&mut self, op: ShutterOp) -> Result<CmdState, DomeError>;

    /// Stop rotation, close the shutter and reject further motion until unparked.
    fn park(&mut self) -> Result<CmdState, DomeError>;

    /// Allow motion again and open the shutter.
    fn unpark(&mut self) -> Result<CmdState, DomeError>;

    /// Stop every actuator and clear any target. Allowed in any state.
    fn abort(&mut self) -> Result<(), DomeError>;

    /// Stop motion, rerun the full calibration and reseed the position estimate.
    fn recalibrate(&mut self) -> Result<CalibConsts, DomeError>;

    fn telemetry(&self) -> DomeTm;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Result of an accepted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdState {
    /// Complete, or the requested state already holds.
    Ok,

    /// Accepted, completion happens in later ticks.
    Busy,
}

/// Errors raised by the dome controller.
#[derive(Debug, thiserror::Error)]
pub enum DomeError {
    #[error("Hardware fault: {0}")]
    Hardware(#[from] HwError),

    #[error("Calibration failed: {0}")]
    Calibration(#[from] CalibError),

    #[error("Position tracking error: {0}")]
    Tracking(#[from] PosTrackError),

    #[error("The dome is not connected")]
    NotConnected,

    #[error("The dome is parked")]
    Parked,
}

impl DomeError {
    /// `true` for errors which leave the dome's hardware in an unknown state.
    pub fn is_hardware_fault(&self) -> bool {
        matches!(
            self,
            DomeError::Hardware(_) | DomeError::Calibration(CalibError::Hardware(_))
        )
    }
}
