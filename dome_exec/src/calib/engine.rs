//! Calibration and homing procedures
//!
//! Both procedures block the caller and drive the actuators directly. Every wait on a sensor is
//! bounded by `stall_timeout_s`, so a stuck sensor ends in [`CalibError::SensorStall`] rather than
//! a dome spinning forever.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};

use super::{CalibConsts, CalibError, Params};
use crate::{
    act_ctrl::ActCtrl,
    hal::{Clock, DomeIo, HwError, SensorId},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single calibration or homing run over borrowed actuators.
struct Run<'a, I: DomeIo, C: Clock> {
    act: &'a mut ActCtrl<I>,
    clock: &'a C,
    params: &'a Params,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Measure the dome's rotation constants.
///
/// The procedure is:
///
/// 1. rotate clockwise to the home entry edge, leaving home first if it is already asserted,
/// 2. time one clockwise revolution back to the entry edge, counting impulse edges (two per
///    impulse),
/// 3. overshoot, then time one counter-clockwise revolution the same way,
/// 4. overshoot, seek home clockwise and time the run from the home entry to the next impulse
///    rising edge, which gives the offset,
/// 5. rotate counter-clockwise until home asserts and stop.
///
/// Measurements whose offset is not inside the first impulse step are discarded and the
/// procedure restarted, up to `max_attempts` times. On success the dome is stopped inside the
/// home region. On any outcome rotation is stopped before returning.
pub fn calibrate<I, C>(
    act: &mut ActCtrl<I>,
    clock: &C,
    params: &Params,
) -> Result<CalibConsts, CalibError>
where
    I: DomeIo,
    C: Clock,
{
    let mut run = Run { act, clock, params };
    let result = run.calibrate();
    run.finish(result)
}

/// Rotate clockwise to the home entry edge and stop.
///
/// Used instead of [`calibrate`] when stored constants are available.
pub fn find_home<I, C>(act: &mut ActCtrl<I>, clock: &C, params: &Params) -> Result<(), CalibError>
where
    I: DomeIo,
    C: Clock,
{
    info!("Seeking home");

    let mut run = Run { act, clock, params };
    let result = run.act.rotate_cw().map_err(CalibError::from).and_then(|_| run.seek_home_entry());
    run.finish(result).map(|_| ())
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a, I: DomeIo, C: Clock> Run<'a, I, C> {
    fn calibrate(&mut self) -> Result<CalibConsts, CalibError> {
        let attempts = self.params.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            info!("Calibration attempt {} of {}", attempt, attempts);

            let (consts, cw_edges) = self.measure()?;

            // Each impulse gives a rising and a falling edge, an odd count means one was missed
            if cw_edges % 2 != 0 {
                warn!(
                    "Calibration attempt {} saw an odd number of impulse edges ({})",
                    attempt, cw_edges
                );
            } else if consts.is_consistent() {
                info!("Calibration complete: {:?}", consts);
                return Ok(consts);
            } else {
                warn!("Calibration attempt {} is inconsistent: {:?}", attempt, consts);
            }

            last = Some(consts);
        }

        let (offset_deg, step_deg) = last
            .map(|c| (c.home_to_impulse_offset_deg, c.step_deg()))
            .unwrap_or((f64::NAN, f64::NAN));

        Err(CalibError::Inconsistent {
            attempts,
            offset_deg,
            step_deg,
        })
    }

    /// One pass of the procedure, without the consistency check.
    ///
    /// Returns the measured constants and the number of impulse edges seen in the clockwise
    /// revolution.
    fn measure(&mut self) -> Result<(CalibConsts, u32), CalibError> {
        self.act.rotate_cw()?;
        self.seek_home_entry()?;

        let (cw_edges, cw_ms) = self.time_revolution()?;
        debug!("CW revolution: {} impulse edges in {:.1} ms", cw_edges, cw_ms);
        if cw_edges == 0 {
            return Err(CalibError::NoImpulses);
        }

        self.clock.sleep_ms(self.params.overshoot_ms);
        self.act.rotate_ccw()?;
        self.seek_home_entry()?;

        let (ccw_edges, ccw_ms) = self.time_revolution()?;
        debug!("CCW revolution: {} impulse edges in {:.1} ms", ccw_edges, ccw_ms);
        if ccw_edges != cw_edges {
            warn!(
                "Impulse edge count differs between directions ({} CW, {} CCW)",
                cw_edges, ccw_edges
            );
        }

        let speed_cw_deg_ms = 360.0 / cw_ms;

        self.clock.sleep_ms(self.params.overshoot_ms);
        self.act.rotate_cw()?;

        // An impulse rising in the same poll as the home entry means the two are aligned
        let offset_ms = if self.seek_home_entry()? {
            0.0
        } else {
            let entry_ms = self.clock.now_ms();
            self.wait_impulse_rising()? - entry_ms
        };
        debug!("Home to impulse: {:.1} ms", offset_ms);

        self.act.rotate_ccw()?;
        self.wait_for(SensorId::Home, true)?;
        self.act.stop_rotation()?;

        let consts = CalibConsts {
            impulses_per_rev: cw_edges / 2,
            speed_cw_deg_ms,
            speed_ccw_deg_ms: 360.0 / ccw_ms,
            home_to_impulse_offset_deg: speed_cw_deg_ms * offset_ms,
        };

        Ok((consts, cw_edges))
    }

    /// Wait for the home sensor's entry edge in the current direction of rotation.
    ///
    /// Returns `true` if the impulse sensor rose in the same poll as home was entered.
    fn seek_home_entry(&mut self) -> Result<bool, CalibError> {
        if self.act.read(SensorId::Home)? {
            debug!("Already at home, leaving home first");
            self.wait_for(SensorId::Home, false)?;
        }

        let mut prev_impulse = self.act.read(SensorId::Impulse)?;
        let mut coincident = false;

        self.poll_until(SensorId::Home, true, |act| {
            let impulse = act.read(SensorId::Impulse)?;
            coincident = impulse && !prev_impulse;
            prev_impulse = impulse;
            act.read(SensorId::Home)
        })?;

        Ok(coincident)
    }

    /// Starting on a home entry edge, rotate until the next one.
    ///
    /// Returns the number of impulse edges seen and the time taken in milliseconds.
    fn time_revolution(&mut self) -> Result<(u32, f64), CalibError> {
        let start_ms = self.clock.now_ms();
        let mut prev_impulse = self.act.read(SensorId::Impulse)?;
        let mut edges = 0;
        let mut left_home = false;

        let end_ms = self.poll_until(SensorId::Home, true, |act| {
            let impulse = act.read(SensorId::Impulse)?;
            if impulse != prev_impulse {
                edges += 1;
                prev_impulse = impulse;
            }

            if act.read(SensorId::Home)? {
                Ok(left_home)
            } else {
                left_home = true;
                Ok(false)
            }
        })?;

        Ok((edges, end_ms - start_ms))
    }

    /// Returns the time of the next impulse rising edge.
    fn wait_impulse_rising(&mut self) -> Result<f64, CalibError> {
        let mut prev = self.act.read(SensorId::Impulse)?;

        self.poll_until(SensorId::Impulse, true, |act| {
            let impulse = act.read(SensorId::Impulse)?;
            let rising = impulse && !prev;
            prev = impulse;
            Ok(rising)
        })
    }

    fn wait_for(&mut self, sensor: SensorId, level: bool) -> Result<f64, CalibError> {
        self.poll_until(sensor, level, |act| Ok(act.read(sensor)? == level))
    }

    /// Poll `done` every `poll_period_ms` until it returns `true`, returning the time at which it
    /// did.
    ///
    /// `sensor` and `level` only describe what is being waited for in the stall error.
    fn poll_until<F>(&mut self, sensor: SensorId, level: bool, mut done: F) -> Result<f64, CalibError>
    where
        F: FnMut(&mut ActCtrl<I>) -> Result<bool, HwError>,
    {
        let start_ms = self.clock.now_ms();
        let timeout_ms = self.params.stall_timeout_s * 1000.0;

        loop {
            if done(&mut *self.act)? {
                return Ok(self.clock.now_ms());
            }

            if self.clock.now_ms() - start_ms > timeout_ms {
                return Err(CalibError::SensorStall {
                    sensor,
                    level,
                    timeout_s: self.params.stall_timeout_s,
                });
            }

            self.clock.sleep_ms(self.params.poll_period_ms);
        }
    }

    /// Stop rotation whatever the outcome, the procedure's own error taking precedence.
    fn finish<T>(self, result: Result<T, CalibError>) -> Result<T, CalibError> {
        let stop = self.act.stop_rotation();

        match result {
            Ok(v) => stop.map(|_| v).map_err(CalibError::from),
            Err(e) => {
                if let Err(stop_err) = stop {
                    warn!("Could not stop rotation after failure: {}", stop_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::{
        sim::{SimClock, SimDome, SimParams},
        RelayId,
    };
    use std::{cell::Cell, rc::Rc};

    /// Simulation whose impulse sensor can be overridden, counting counter-clockwise starts.
    ///
    /// Each calibration pass starts counter-clockwise rotation twice.
    struct ImpulseFaultIo {
        inner: SimDome,
        /// Maps the true azimuth and time onto a forced impulse reading
        fault: fn(f64, f64) -> Option<bool>,
        ccw_starts: Rc<Cell<u32>>,
    }

    impl DomeIo for ImpulseFaultIo {
        fn read_sensor(&mut self, sensor: SensorId) -> Result<bool, HwError> {
            if sensor == SensorId::Impulse {
                let now_ms = self.inner.clock().now_ms();
                if let Some(level) = (self.fault)(self.inner.true_az_deg(), now_ms) {
                    return Ok(level);
                }
            }
            self.inner.read_sensor(sensor)
        }

        fn write_relay(&mut self, relay: RelayId, energised: bool) -> Result<(), HwError> {
            if relay == RelayId::Left && energised {
                self.ccw_starts.set(self.ccw_starts.get() + 1);
            }
            self.inner.write_relay(relay, energised)
        }
    }

    fn sim() -> (ActCtrl<SimDome>, SimDome) {
        let dome = sim_dome();
        (ActCtrl::new(dome.clone()), dome)
    }

    fn faulty_sim(
        fault: fn(f64, f64) -> Option<bool>,
    ) -> (ActCtrl<ImpulseFaultIo>, SimDome, Rc<Cell<u32>>) {
        let dome = sim_dome();
        let ccw_starts = Rc::new(Cell::new(0));
        let io = ImpulseFaultIo {
            inner: dome.clone(),
            fault,
            ccw_starts: ccw_starts.clone(),
        };

        (ActCtrl::new(io), dome, ccw_starts)
    }

    fn sim_dome() -> SimDome {
        SimDome::new(
            SimParams {
                speed_cw_deg_ms: 0.1,
                speed_ccw_deg_ms: 0.05,
                impulses_per_rev: 8,
                impulse_width_deg: 10.0,
                home_to_impulse_offset_deg: 5.0,
                home_width_deg: 3.0,
                shutter_travel_ms: 1000.0,
                start_az_deg: 200.0,
                start_shutter_frac: 0.0,
            },
            SimClock::manual(),
        )
    }

    fn params() -> Params {
        Params {
            poll_period_ms: 1.0,
            stall_timeout_s: 10.0,
            overshoot_ms: 1000.0,
            max_attempts: 3,
        }
    }

    fn rotation_released(dome: &SimDome) -> bool {
        !dome.relay(RelayId::Right) && !dome.relay(RelayId::Left)
    }

    #[test]
    fn test_calibrate_recovers_constants() {
        let (mut act, dome) = sim();
        let clock = dome.clock();

        let consts = calibrate(&mut act, &clock, &params()).unwrap();

        assert_eq!(consts.impulses_per_rev, 8);
        assert!((consts.speed_cw_deg_ms - 0.1).abs() < 1e-4);
        assert!((consts.speed_ccw_deg_ms - 0.05).abs() < 1e-4);
        assert!((consts.home_to_impulse_offset_deg - 5.0).abs() < 0.2);
        assert!(consts.is_consistent());

        // Left stopped inside home
        assert!(rotation_released(&dome));
        assert!(dome.true_az_deg() < 3.0);
    }

    #[test]
    fn test_calibrate_starting_at_home() {
        let (mut act, dome) = sim();
        let clock = dome.clock();

        // Get into the home region first
        find_home(&mut act, &clock, &params()).unwrap();
        let consts = calibrate(&mut act, &clock, &params()).unwrap();

        assert_eq!(consts.impulses_per_rev, 8);
        assert!((consts.speed_cw_deg_ms - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_calibrate_stall() {
        let (mut act, dome) = sim();
        let clock = dome.clock();
        dome.stick_sensor(SensorId::Home, Some(false));

        let start_ms = clock.now_ms();
        let err = calibrate(&mut act, &clock, &params()).unwrap_err();

        assert!(matches!(
            err,
            CalibError::SensorStall {
                sensor: SensorId::Home,
                level: true,
                ..
            }
        ));
        assert!(clock.now_ms() - start_ms < 10_100.0);
        assert!(rotation_released(&dome));
    }

    #[test]
    fn test_calibrate_no_impulses() {
        let (mut act, dome) = sim();
        let clock = dome.clock();
        dome.stick_sensor(SensorId::Impulse, Some(false));

        assert!(matches!(
            calibrate(&mut act, &clock, &params()),
            Err(CalibError::NoImpulses)
        ));
        assert!(rotation_released(&dome));
    }

    #[test]
    fn test_find_home() {
        let (mut act, dome) = sim();
        let clock = dome.clock();

        find_home(&mut act, &clock, &params()).unwrap();

        assert!(dome.true_az_deg() < 3.0);
        assert!(rotation_released(&dome));
        assert_eq!(act.direction(), crate::act_ctrl::RotationDirection::Stopped);
    }

    #[test]
    fn test_calibrate_inconsistent() {
        // Hiding the impulses at 5 and 50 deg leaves six impulses with the first at 95 deg, which
        // is further from home than the 60 deg step
        let (mut act, dome, ccw_starts) =
            faulty_sim(|az_deg, _| if az_deg < 90.0 { Some(false) } else { None });
        let clock = dome.clock();

        let err = calibrate(&mut act, &clock, &params()).unwrap_err();

        match err {
            CalibError::Inconsistent {
                attempts,
                offset_deg,
                step_deg,
            } => {
                assert_eq!(attempts, 3);
                assert!((offset_deg - 95.0).abs() < 0.2);
                assert!((step_deg - 60.0).abs() < 1e-9);
            }
            e => panic!("Expected an inconsistent calibration, got {:?}", e),
        }

        // Every attempt measured both directions
        assert_eq!(ccw_starts.get(), 6);
        assert!(rotation_released(&dome));
    }

    #[test]
    fn test_calibrate_odd_edges_retried() {
        // Homing from 200 deg takes 1600 ms and the first clockwise revolution ends at 5200 ms.
        // Forcing the impulse high just before that adds an unmatched rising edge to the first
        // attempt only.
        let (mut act, dome, ccw_starts) = faulty_sim(|_, now_ms| {
            if now_ms >= 5150.0 && now_ms < 5300.0 {
                Some(true)
            } else {
                None
            }
        });
        let clock = dome.clock();

        let consts = calibrate(&mut act, &clock, &params()).unwrap();

        assert_eq!(consts.impulses_per_rev, 8);
        assert!((consts.home_to_impulse_offset_deg - 5.0).abs() < 0.2);
        assert_eq!(ccw_starts.get(), 4);
        assert!(rotation_released(&dome));
    }
}
