//! Simulated dome enclosure
//!
//! The simulation integrates the dome's true azimuth and shutter position from the relay states
//! every time it is accessed. Sensors are derived from the true state:
//!
//! - home is asserted over `[0, home_width_deg)`,
//! - the impulse switch is asserted over `[offset + k * step, offset + k * step + width)` for each
//!   of the `impulses_per_rev` impulses, where `step = 360 / impulses_per_rev`,
//! - the shutter limit switches assert at the ends of travel.
//!
//! The simulation shares its time with a [`SimClock`], which is either driven manually (tests, where
//! sleeping advances time instantly) or follows the system clock.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Instant,
};
use util::maths::{rem_euclid, range_reduce_deg};

use super::{Clock, DomeIo, HwError, RelayId, SensorId};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Physical properties of the simulated dome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Units: degrees/millisecond
    pub speed_cw_deg_ms: f64,

    /// Units: degrees/millisecond
    pub speed_ccw_deg_ms: f64,

    pub impulses_per_rev: u32,

    /// Angular width of each impulse region.
    ///
    /// Units: degrees
    pub impulse_width_deg: f64,

    /// Angle from the home entry point to the first impulse rising edge.
    ///
    /// Units: degrees
    pub home_to_impulse_offset_deg: f64,

    /// Units: degrees
    pub home_width_deg: f64,

    /// Time for the shutter to travel fully open or closed.
    ///
    /// Units: milliseconds
    pub shutter_travel_ms: f64,

    /// Units: degrees
    pub start_az_deg: f64,

    /// Fraction the shutter is open at start, 0 is closed, 1 is open.
    pub start_shutter_frac: f64,
}

/// Clock shared between the simulation and the controller.
#[derive(Debug, Clone)]
pub struct SimClock {
    manual_ms: Rc<Cell<f64>>,
    real_start: Option<Instant>,
}

/// The simulated dome, cheap to clone, all clones share one world.
#[derive(Debug, Clone)]
pub struct SimDome {
    world: Rc<RefCell<World>>,
    clock: SimClock,
}

#[derive(Debug)]
struct World {
    params: SimParams,
    last_ms: f64,
    az_deg: f64,
    shutter_frac: f64,
    relays: HashMap<RelayId, bool>,
    stuck: HashMap<SensorId, bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            speed_cw_deg_ms: 0.006,
            speed_ccw_deg_ms: 0.0055,
            impulses_per_rev: 20,
            impulse_width_deg: 6.0,
            home_to_impulse_offset_deg: 4.0,
            home_width_deg: 3.0,
            shutter_travel_ms: 20_000.0,
            start_az_deg: 200.0,
            start_shutter_frac: 0.0,
        }
    }
}

impl SimClock {
    /// A clock which only advances when slept on or advanced explicitly.
    pub fn manual() -> Self {
        Self {
            manual_ms: Rc::new(Cell::new(0.0)),
            real_start: None,
        }
    }

    /// A clock following the system's monotonic clock.
    pub fn real_time() -> Self {
        Self {
            manual_ms: Rc::new(Cell::new(0.0)),
            real_start: Some(Instant::now()),
        }
    }

    /// Advance a manual clock. Has no effect on a real time clock.
    pub fn advance_ms(&self, ms: f64) {
        self.manual_ms.set(self.manual_ms.get() + ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> f64 {
        match self.real_start {
            Some(s) => s.elapsed().as_secs_f64() * 1000.0,
            None => self.manual_ms.get(),
        }
    }

    fn sleep_ms(&self, ms: f64) {
        match self.real_start {
            Some(_) if ms > 0.0 => {
                std::thread::sleep(std::time::Duration::from_secs_f64(ms / 1000.0))
            }
            Some(_) => (),
            None => self.advance_ms(ms),
        }
    }
}

impl SimDome {
    pub fn new(params: SimParams, clock: SimClock) -> Self {
        let world = World {
            last_ms: clock.now_ms(),
            az_deg: range_reduce_deg(params.start_az_deg),
            shutter_frac: params.start_shutter_frac.max(0.0).min(1.0),
            relays: HashMap::new(),
            stuck: HashMap::new(),
            params,
        };

        Self {
            world: Rc::new(RefCell::new(world)),
            clock,
        }
    }

    /// The clock driving this simulation.
    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// The dome's true azimuth.
    pub fn true_az_deg(&self) -> f64 {
        self.sync();
        self.world.borrow().az_deg
    }

    /// The shutter's true position, 0 is closed, 1 is open.
    pub fn shutter_frac(&self) -> f64 {
        self.sync();
        self.world.borrow().shutter_frac
    }

    /// Force a sensor to read a fixed level, or release it with `None`.
    pub fn stick_sensor(&self, sensor: SensorId, level: Option<bool>) {
        let mut w = self.world.borrow_mut();
        match level {
            Some(l) => w.stuck.insert(sensor, l),
            None => w.stuck.remove(&sensor),
        };
    }

    /// Current state of a relay.
    pub fn relay(&self, relay: RelayId) -> bool {
        self.world.borrow().relay(relay)
    }

    /// Bring the world up to the clock's current time.
    fn sync(&self) {
        let now = self.clock.now_ms();
        self.world.borrow_mut().integrate(now);
    }
}

impl DomeIo for SimDome {
    fn read_sensor(&mut self, sensor: SensorId) -> Result<bool, HwError> {
        self.sync();
        Ok(self.world.borrow().sensor(sensor))
    }

    fn write_relay(&mut self, relay: RelayId, energised: bool) -> Result<(), HwError> {
        self.sync();

        let mut w = self.world.borrow_mut();

        if energised && w.relay(relay.pair()) {
            return Err(HwError::RelayConflict(relay, relay.pair()));
        }

        w.relays.insert(relay, energised);

        Ok(())
    }
}

impl World {
    fn relay(&self, relay: RelayId) -> bool {
        self.relays.get(&relay).copied().unwrap_or(false)
    }

    fn integrate(&mut self, now_ms: f64) {
        let dt = now_ms - self.last_ms;
        self.last_ms = now_ms;

        if dt <= 0.0 {
            return;
        }

        let p = &self.params;

        match (self.relay(RelayId::Right), self.relay(RelayId::Left)) {
            (true, false) => self.az_deg = range_reduce_deg(self.az_deg + p.speed_cw_deg_ms * dt),
            (false, true) => {
                self.az_deg = range_reduce_deg(self.az_deg - p.speed_ccw_deg_ms * dt)
            }
            _ => (),
        }

        let shutter_rate = 1.0 / p.shutter_travel_ms;
        match (self.relay(RelayId::Open), self.relay(RelayId::Close)) {
            (true, false) => self.shutter_frac = (self.shutter_frac + shutter_rate * dt).min(1.0),
            (false, true) => self.shutter_frac = (self.shutter_frac - shutter_rate * dt).max(0.0),
            _ => (),
        }
    }

    fn sensor(&self, sensor: SensorId) -> bool {
        if let Some(&level) = self.stuck.get(&sensor) {
            return level;
        }

        let p = &self.params;

        match sensor {
            SensorId::Open => self.shutter_frac >= 1.0,
            SensorId::Closed => self.shutter_frac <= 0.0,
            SensorId::Home => self.az_deg < p.home_width_deg,
            SensorId::Impulse => {
                let step = 360.0 / p.impulses_per_rev as f64;
                let from_impulse =
                    rem_euclid(range_reduce_deg(self.az_deg - p.home_to_impulse_offset_deg), step);
                from_impulse < p.impulse_width_deg
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sim() -> SimDome {
        SimDome::new(
            SimParams {
                speed_cw_deg_ms: 0.1,
                speed_ccw_deg_ms: 0.05,
                impulses_per_rev: 8,
                impulse_width_deg: 10.0,
                home_to_impulse_offset_deg: 5.0,
                home_width_deg: 3.0,
                shutter_travel_ms: 1000.0,
                start_az_deg: 350.0,
                start_shutter_frac: 0.0,
            },
            SimClock::manual(),
        )
    }

    #[test]
    fn test_sim_rotation() {
        let mut s = sim();
        let clock = s.clock();

        assert!(!s.read_sensor(SensorId::Home).unwrap());

        // 100 ms clockwise at 0.1 deg/ms crosses home into the first 10 degrees
        s.write_relay(RelayId::Right, true).unwrap();
        clock.sleep_ms(101.0);
        assert!((s.true_az_deg() - 0.1).abs() < 1e-9);
        assert!(s.read_sensor(SensorId::Home).unwrap());
        assert!(!s.read_sensor(SensorId::Impulse).unwrap());

        clock.sleep_ms(50.0);
        assert!(!s.read_sensor(SensorId::Home).unwrap());
        assert!(s.read_sensor(SensorId::Impulse).unwrap());

        // Counter-clockwise at half the speed
        s.write_relay(RelayId::Right, false).unwrap();
        s.write_relay(RelayId::Left, true).unwrap();
        clock.sleep_ms(100.0);
        assert!((s.true_az_deg() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_sim_relay_conflict() {
        let mut s = sim();
        s.write_relay(RelayId::Open, true).unwrap();
        assert!(matches!(
            s.write_relay(RelayId::Close, true),
            Err(HwError::RelayConflict(RelayId::Close, RelayId::Open))
        ));
        assert!(!s.relay(RelayId::Close));
    }

    #[test]
    fn test_sim_shutter() {
        let mut s = sim();
        let clock = s.clock();

        assert!(s.read_sensor(SensorId::Closed).unwrap());

        s.write_relay(RelayId::Open, true).unwrap();
        clock.sleep_ms(500.0);
        assert!(!s.read_sensor(SensorId::Closed).unwrap());
        assert!(!s.read_sensor(SensorId::Open).unwrap());

        clock.sleep_ms(600.0);
        assert!(s.read_sensor(SensorId::Open).unwrap());
        assert_eq!(s.shutter_frac(), 1.0);

        s.stick_sensor(SensorId::Open, Some(false));
        assert!(!s.read_sensor(SensorId::Open).unwrap());
    }
}
