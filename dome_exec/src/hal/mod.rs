//! # Hardware abstraction layer
//!
//! The dome's electrical interface is four relays (two pairs: rotation right/left, shutter
//! open/close) and four binary sensors. Everything above this module sees the hardware only
//! through the [`DomeIo`] and [`Clock`] traits, so the same control code runs against the
//! Raspberry Pi GPIO ([`rpi::RpiIo`]) or the simulation ([`sim::SimDome`]).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`DomeIo`] implementation on the Raspberry Pi GPIO header.
#[cfg(target_arch = "arm")]
pub mod rpi;

/// Simulated dome enclosure.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Instant;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Raw access to the dome's relays and sensors.
pub trait DomeIo {
    /// Read a sensor, returning `true` if it is asserted.
    fn read_sensor(&mut self, sensor: SensorId) -> Result<bool, HwError>;

    /// Energise (`true`) or release (`false`) a relay.
    fn write_relay(&mut self, relay: RelayId, energised: bool) -> Result<(), HwError>;
}

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point.
    fn now_ms(&self) -> f64;

    /// Block the caller for the given number of milliseconds.
    fn sleep_ms(&self, ms: f64);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// [`Clock`] backed by the system's monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SysClock {
    start: Instant,
}

/// GPIO wiring of the dome.
///
/// Pin numbers are BCM numbers. The defaults are the reference wiring of the observatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioParams {
    pub pin_right: u8,
    pub pin_left: u8,
    pub pin_open: u8,
    pub pin_close: u8,
    pub pin_is_open: u8,
    pub pin_is_closed: u8,
    pub pin_home: u8,
    pub pin_impulse: u8,

    /// Relay boards on the reference hardware energise on a low output
    pub relay_active_low: bool,

    /// Sensors pull the input low when asserted
    pub sensor_active_low: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The dome's binary sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    /// Shutter fully open limit switch
    Open,
    /// Shutter fully closed limit switch
    Closed,
    /// Home (north) region switch
    Home,
    /// Rotation impulse switch
    Impulse,
}

/// The dome's relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayId {
    /// Rotate clockwise
    Right,
    /// Rotate counter-clockwise
    Left,
    /// Drive shutter open
    Open,
    /// Drive shutter closed
    Close,
}

/// Hardware faults. All of these are fatal to the controller.
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("Could not set up GPIO pin {pin}: {reason}")]
    GpioSetup { pin: u8, reason: String },

    #[error("Relay {0:?} was energised while its pair {1:?} is energised")]
    RelayConflict(RelayId, RelayId),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SysClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SysClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SysClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_ms(&self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(ms / 1000.0));
        }
    }
}

impl RelayId {
    /// The other relay of this relay's pair.
    pub fn pair(self) -> RelayId {
        match self {
            RelayId::Right => RelayId::Left,
            RelayId::Left => RelayId::Right,
            RelayId::Open => RelayId::Close,
            RelayId::Close => RelayId::Open,
        }
    }
}

impl Default for GpioParams {
    fn default() -> Self {
        Self {
            pin_right: 22,
            pin_left: 23,
            pin_open: 24,
            pin_close: 25,
            pin_is_open: 26,
            pin_is_closed: 16,
            pin_home: 5,
            pin_impulse: 6,
            relay_active_low: true,
            sensor_active_low: true,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TEST SUPPORT
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;

    /// [`DomeIo`] with settable sensor levels which records every relay write.
    #[derive(Debug, Default)]
    pub struct RecordingIo {
        pub sensors: HashMap<SensorId, bool>,
        pub writes: Vec<(RelayId, bool)>,
        pub relays: HashMap<RelayId, bool>,
    }

    impl RecordingIo {
        pub fn set(&mut self, sensor: SensorId, level: bool) {
            self.sensors.insert(sensor, level);
        }

        pub fn energised(&self, relay: RelayId) -> bool {
            self.relays.get(&relay).copied().unwrap_or(false)
        }
    }

    impl DomeIo for RecordingIo {
        fn read_sensor(&mut self, sensor: SensorId) -> Result<bool, HwError> {
            Ok(self.sensors.get(&sensor).copied().unwrap_or(false))
        }

        fn write_relay(&mut self, relay: RelayId, energised: bool) -> Result<(), HwError> {
            self.writes.push((relay, energised));
            self.relays.insert(relay, energised);
            if energised && self.energised(relay.pair()) {
                return Err(HwError::RelayConflict(relay, relay.pair()));
            }
            Ok(())
        }
    }
}
