//! # Actuator control module
//!
//! Translates high level actuator commands into relay writes. Each command writes both relays of
//! a pair, always releasing the opposite relay before energising the requested one, so a pair is
//! never driven both ways at once.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use serde::{Deserialize, Serialize};

use crate::hal::{Clock, DomeIo, HwError, RelayId, SensorId};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Owner of the dome's I/O port.
///
/// All relay writes go through here, which also tracks the last commanded rotation direction.
#[derive(Debug)]
pub struct ActCtrl<I: DomeIo> {
    io: I,
    direction: RotationDirection,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Last commanded rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationDirection {
    /// Increasing azimuth
    Clockwise,
    /// Decreasing azimuth
    CounterClockwise,
    Stopped,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I: DomeIo> ActCtrl<I> {
    /// Wrap an I/O port. No relays are written, the direction starts as stopped.
    pub fn new(io: I) -> Self {
        Self {
            io,
            direction: RotationDirection::Stopped,
        }
    }

    pub fn direction(&self) -> RotationDirection {
        self.direction
    }

    pub fn read(&mut self, sensor: SensorId) -> Result<bool, HwError> {
        self.io.read_sensor(sensor)
    }

    pub fn rotate_cw(&mut self) -> Result<(), HwError> {
        self.drive_pair(RelayId::Right)?;
        self.direction = RotationDirection::Clockwise;
        Ok(())
    }

    pub fn rotate_ccw(&mut self) -> Result<(), HwError> {
        self.drive_pair(RelayId::Left)?;
        self.direction = RotationDirection::CounterClockwise;
        Ok(())
    }

    /// Rotate in the given direction, `Stopped` stops rotation.
    pub fn rotate(&mut self, direction: RotationDirection) -> Result<(), HwError> {
        match direction {
            RotationDirection::Clockwise => self.rotate_cw(),
            RotationDirection::CounterClockwise => self.rotate_ccw(),
            RotationDirection::Stopped => self.stop_rotation(),
        }
    }

    pub fn stop_rotation(&mut self) -> Result<(), HwError> {
        self.release_pair(RelayId::Right)?;
        self.direction = RotationDirection::Stopped;
        Ok(())
    }

    pub fn open_shutter(&mut self) -> Result<(), HwError> {
        self.drive_pair(RelayId::Open)
    }

    pub fn close_shutter(&mut self) -> Result<(), HwError> {
        self.drive_pair(RelayId::Close)
    }

    pub fn stop_shutter(&mut self) -> Result<(), HwError> {
        self.release_pair(RelayId::Open)
    }

    /// Release every relay.
    ///
    /// Both pairs are attempted even if the first fails, the first error is returned.
    pub fn stop_all(&mut self) -> Result<(), HwError> {
        let rot = self.stop_rotation();
        let shutter = self.stop_shutter();
        rot.and(shutter)
    }

    /// Exercise the rotation relays: right for `duration_ms`, left for `duration_ms`, then stop.
    pub fn relay_check<C: Clock>(&mut self, clock: &C, duration_ms: f64) -> Result<(), HwError> {
        self.rotate_cw()?;
        clock.sleep_ms(duration_ms);
        self.rotate_ccw()?;
        clock.sleep_ms(duration_ms);
        self.stop_rotation()
    }

    fn drive_pair(&mut self, relay: RelayId) -> Result<(), HwError> {
        trace!("Driving {:?}", relay);
        self.io.write_relay(relay.pair(), false)?;
        self.io.write_relay(relay, true)
    }

    fn release_pair(&mut self, relay: RelayId) -> Result<(), HwError> {
        self.io.write_relay(relay, false)?;
        self.io.write_relay(relay.pair(), false)
    }

    #[cfg(test)]
    pub(crate) fn io(&self) -> &I {
        &self.io
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::mock::RecordingIo;

    #[test]
    fn test_pair_ordering() {
        let mut act = ActCtrl::new(RecordingIo::default());

        act.rotate_cw().unwrap();
        assert_eq!(act.direction(), RotationDirection::Clockwise);
        assert_eq!(
            act.io().writes,
            vec![(RelayId::Left, false), (RelayId::Right, true)]
        );

        // Reversing must release the right relay before the left one is energised
        act.rotate_ccw().unwrap();
        assert_eq!(act.direction(), RotationDirection::CounterClockwise);
        assert_eq!(
            act.io().writes[2..],
            [(RelayId::Right, false), (RelayId::Left, true)]
        );

        act.stop_rotation().unwrap();
        assert_eq!(act.direction(), RotationDirection::Stopped);
        assert!(!act.io().energised(RelayId::Left));
        assert!(!act.io().energised(RelayId::Right));
    }

    #[test]
    fn test_shutter_leaves_direction() {
        let mut act = ActCtrl::new(RecordingIo::default());

        act.rotate_cw().unwrap();
        act.open_shutter().unwrap();
        act.close_shutter().unwrap();
        assert_eq!(act.direction(), RotationDirection::Clockwise);
        assert!(act.io().energised(RelayId::Close));
        assert!(!act.io().energised(RelayId::Open));

        act.stop_all().unwrap();
        assert_eq!(act.direction(), RotationDirection::Stopped);
        assert!(act.io().relays.values().all(|&e| !e));
    }
}
