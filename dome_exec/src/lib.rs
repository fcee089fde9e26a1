//! # Dome library.
//!
//! This library allows other crates in the workspace to access items defined inside the dome
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator control - turns rotation and shutter commands into paired relay writes
pub mod act_ctrl;

/// Calibration - measures the dome's rotation constants and finds home
pub mod calib;

/// Dome control - the command surface the host drives the dome through
pub mod dome_ctrl;

/// Hardware abstraction - relays, sensors and clocks, real or simulated
pub mod hal;

/// Executable parameters
pub mod params;

/// Position tracking - dead reckons the azimuth and decides when a move has arrived
pub mod pos_track;

/// Shutter control - drives the shutter between its limit switches
pub mod shutter_ctrl;

/// Telecommand server - receives telecommands from the ground
pub mod tc_server;

/// Telemetry server - publishes the dome's state
pub mod tm_server;
