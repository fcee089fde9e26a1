//! [`DomeIo`] implementation for the Raspberry Pi GPIO header

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use rppal::gpio::{Gpio, InputPin, OutputPin};

use super::{DomeIo, GpioParams, HwError, RelayId, SensorId};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Relays and sensors wired directly to the Pi's GPIO pins.
pub struct RpiIo {
    right: OutputPin,
    left: OutputPin,
    open: OutputPin,
    close: OutputPin,

    is_open: InputPin,
    is_closed: InputPin,
    home: InputPin,
    impulse: InputPin,

    relay_active_low: bool,
    sensor_active_low: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RpiIo {
    /// Claim and configure all pins given in `params`.
    ///
    /// Relays start released. Sensor inputs get pull-downs.
    pub fn new(params: &GpioParams) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::GpioSetup {
            pin: 0,
            reason: e.to_string(),
        })?;

        let output = |pin: u8| -> Result<OutputPin, HwError> {
            let p = gpio.get(pin).map_err(|e| HwError::GpioSetup {
                pin,
                reason: e.to_string(),
            })?;

            debug!("Relay pin {} configured", pin);

            Ok(match params.relay_active_low {
                true => p.into_output_high(),
                false => p.into_output_low(),
            })
        };

        let input = |pin: u8| -> Result<InputPin, HwError> {
            let p = gpio.get(pin).map_err(|e| HwError::GpioSetup {
                pin,
                reason: e.to_string(),
            })?;

            debug!("Sensor pin {} configured", pin);

            Ok(p.into_input_pulldown())
        };

        Ok(Self {
            right: output(params.pin_right)?,
            left: output(params.pin_left)?,
            open: output(params.pin_open)?,
            close: output(params.pin_close)?,
            is_open: input(params.pin_is_open)?,
            is_closed: input(params.pin_is_closed)?,
            home: input(params.pin_home)?,
            impulse: input(params.pin_impulse)?,
            relay_active_low: params.relay_active_low,
            sensor_active_low: params.sensor_active_low,
        })
    }
}

impl DomeIo for RpiIo {
    fn read_sensor(&mut self, sensor: SensorId) -> Result<bool, HwError> {
        let pin = match sensor {
            SensorId::Open => &self.is_open,
            SensorId::Closed => &self.is_closed,
            SensorId::Home => &self.home,
            SensorId::Impulse => &self.impulse,
        };

        Ok(pin.is_high() != self.sensor_active_low)
    }

    fn write_relay(&mut self, relay: RelayId, energised: bool) -> Result<(), HwError> {
        let pin = match relay {
            RelayId::Right => &mut self.right,
            RelayId::Left => &mut self.left,
            RelayId::Open => &mut self.open,
            RelayId::Close => &mut self.close,
        };

        if energised != self.relay_active_low {
            pin.set_high()
        } else {
            pin.set_low()
        }

        Ok(())
    }
}
