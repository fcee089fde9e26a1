//! Implementations for the PosTrack state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::PosTrackError;
use crate::{act_ctrl::RotationDirection, calib::CalibConsts};
use util::{
    maths::{get_ang_dist_deg, has_crossed_deg, range_reduce_deg},
    module::State,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position tracking module state
#[derive(Debug, Default)]
pub struct PosTrack {
    consts: Option<CalibConsts>,

    /// Current azimuth estimate, always in [0, 360).
    az_deg: f64,

    /// Azimuth the next clockwise impulse rising edge will be at. Not range reduced.
    next_cw_deg: f64,

    /// Azimuth the next counter-clockwise impulse falling edge will be at. Not range reduced.
    next_ccw_deg: f64,

    target_deg: Option<f64>,

    last_ms: f64,
    last_impulse: bool,
    last_home: bool,

    report: StatusReport,
}

/// Seed for the tracker, taken with the dome stopped at home.
#[derive(Debug, Clone, Copy)]
pub struct InitData {
    pub consts: CalibConsts,

    /// Units: milliseconds
    pub now_ms: f64,

    /// Impulse sensor level at the time of seeding.
    pub impulse: bool,

    /// Home sensor level at the time of seeding.
    pub home: bool,
}

/// Input data to position tracking.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Units: milliseconds
    pub now_ms: f64,

    pub impulse: bool,
    pub home: bool,

    /// Rotation direction actually commanded since the last cycle.
    pub direction: RotationDirection,
}

/// Rotation demand for the actuators, or `None` if the tracker has no target and rotation is
/// left to manual commands.
pub type OutputData = Option<RotationDirection>;

/// Status report for PosTrack processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The target was reached this cycle.
    pub arrived: bool,

    /// The home sensor was entered this cycle.
    pub home_crossed: bool,

    /// The azimuth was snapped onto an impulse this cycle.
    pub impulse_snapped: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for PosTrack {
    type InitData = InitData;
    type InitError = PosTrackError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = PosTrackError;

    /// Seed the tracker at azimuth 0.
    ///
    /// Any target is cleared.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let consts = init_data.consts;

        if !consts.is_consistent() {
            return Err(PosTrackError::InvalidConsts(consts));
        }

        self.consts = Some(consts);
        self.az_deg = 0.0;
        self.target_deg = None;
        self.last_ms = init_data.now_ms;
        self.last_impulse = init_data.impulse;
        self.last_home = init_data.home;
        self.report = StatusReport::default();

        self.anchor(&consts);

        // An impulse aligned with home has already been passed if it is asserted now
        if consts.home_to_impulse_offset_deg == 0.0 && init_data.impulse {
            self.advance_cw(consts.step_deg());
        }

        debug!(
            "PosTrack seeded, next impulses at {:.3} (CW) and {:.3} (CCW)",
            range_reduce_deg(self.next_cw_deg),
            range_reduce_deg(self.next_ccw_deg)
        );

        Ok(())
    }

    /// Advance the azimuth estimate by one cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let consts = self.consts.ok_or(PosTrackError::NotInitialised)?;
        let step = consts.step_deg();

        self.report = StatusReport::default();

        let dt_ms = (input_data.now_ms - self.last_ms).max(0.0);
        self.last_ms = input_data.now_ms;

        let prev_az = self.az_deg;

        // Dead reckoning
        self.az_deg = match input_data.direction {
            RotationDirection::Clockwise => {
                range_reduce_deg(self.az_deg + consts.speed_cw_deg_ms * dt_ms)
            }
            RotationDirection::CounterClockwise => {
                range_reduce_deg(self.az_deg - consts.speed_ccw_deg_ms * dt_ms)
            }
            RotationDirection::Stopped => self.az_deg,
        };

        let impulse_rising = input_data.impulse && !self.last_impulse;
        let impulse_falling = !input_data.impulse && self.last_impulse;
        let home_rising = input_data.home && !self.last_home;
        self.last_impulse = input_data.impulse;
        self.last_home = input_data.home;

        // Impulse snaps. Trailing edges carry no position information.
        match input_data.direction {
            RotationDirection::Clockwise if impulse_rising => {
                trace!("CW impulse, {:.3} -> {:.3}", self.az_deg, self.next_cw_deg);
                self.az_deg = range_reduce_deg(self.next_cw_deg);
                self.advance_cw(step);
                self.report.impulse_snapped = true;
            }
            RotationDirection::CounterClockwise if impulse_falling => {
                trace!("CCW impulse, {:.3} -> {:.3}", self.az_deg, self.next_ccw_deg);
                self.az_deg = range_reduce_deg(self.next_ccw_deg);
                self.advance_ccw(step);
                self.report.impulse_snapped = true;
            }
            _ => (),
        }

        // Home overrides any impulse snap in the same cycle
        if home_rising {
            trace!("Home, {:.3} -> 0", self.az_deg);
            self.az_deg = 0.0;
            self.anchor(&consts);
            self.report.home_crossed = true;

            if consts.home_to_impulse_offset_deg == 0.0
                && impulse_rising
                && input_data.direction == RotationDirection::Clockwise
            {
                self.advance_cw(step);
            }
        }

        let output = match self.target_deg {
            Some(target) if has_crossed_deg(prev_az, self.az_deg, target) => {
                debug!("Arrived at {:.3} (estimate {:.3})", target, self.az_deg);
                self.target_deg = None;
                self.report.arrived = true;
                Some(RotationDirection::Stopped)
            }
            Some(target) if get_ang_dist_deg(self.az_deg, target) >= 0.0 => {
                Some(RotationDirection::Clockwise)
            }
            Some(_) => Some(RotationDirection::CounterClockwise),
            None => None,
        };

        Ok((output, self.report))
    }
}

impl PosTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the tracker has been seeded.
    pub fn is_initialised(&self) -> bool {
        self.consts.is_some()
    }

    pub fn consts(&self) -> Option<CalibConsts> {
        self.consts
    }

    /// Azimuth estimate in [0, 360).
    pub fn az_deg(&self) -> f64 {
        self.az_deg
    }

    pub fn target_deg(&self) -> Option<f64> {
        self.target_deg
    }

    /// The raw (not range reduced) clockwise and counter-clockwise impulse predictions.
    pub fn predictors_deg(&self) -> (f64, f64) {
        (self.next_cw_deg, self.next_ccw_deg)
    }

    /// Set a new target, replacing any previous one. Takes effect on the next cycle.
    pub fn set_target(&mut self, az_deg: f64) {
        self.target_deg = Some(range_reduce_deg(az_deg));
    }

    pub fn clear_target(&mut self) {
        self.target_deg = None;
    }

    /// Place the predictors either side of the home entry point.
    fn anchor(&mut self, consts: &CalibConsts) {
        self.next_cw_deg = consts.home_to_impulse_offset_deg;
        self.next_ccw_deg = consts.home_to_impulse_offset_deg - consts.step_deg();
    }

    fn advance_cw(&mut self, step: f64) {
        self.next_ccw_deg = self.next_cw_deg;
        self.next_cw_deg += step;
    }

    fn advance_ccw(&mut self, step: f64) {
        self.next_cw_deg = self.next_ccw_deg;
        self.next_ccw_deg -= step;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use RotationDirection::*;

    fn consts(offset: f64) -> CalibConsts {
        CalibConsts {
            impulses_per_rev: 4,
            speed_cw_deg_ms: 2.0,
            speed_ccw_deg_ms: 2.0,
            home_to_impulse_offset_deg: offset,
        }
    }

    fn seeded(offset: f64) -> PosTrack {
        let mut pt = PosTrack::new();
        pt.init(InitData {
            consts: consts(offset),
            now_ms: 0.0,
            impulse: false,
            home: true,
        })
        .unwrap();
        pt
    }

    fn input(now_ms: f64, direction: RotationDirection) -> InputData {
        InputData {
            now_ms,
            impulse: false,
            home: false,
            direction,
        }
    }

    #[test]
    fn test_not_initialised() {
        let mut pt = PosTrack::new();
        assert!(!pt.is_initialised());
        assert!(matches!(
            pt.proc(&input(10.0, Clockwise)),
            Err(PosTrackError::NotInitialised)
        ));

        let mut bad = consts(5.0);
        bad.home_to_impulse_offset_deg = 100.0;
        assert!(matches!(
            pt.init(InitData {
                consts: bad,
                now_ms: 0.0,
                impulse: false,
                home: true
            }),
            Err(PosTrackError::InvalidConsts(_))
        ));
    }

    #[test]
    fn test_seed_predictors() {
        let pt = seeded(5.0);

        assert_eq!(pt.az_deg(), 0.0);
        assert_eq!(pt.predictors_deg(), (5.0, -85.0));
        assert_eq!(range_reduce_deg(pt.predictors_deg().1), 275.0);
    }

    #[test]
    fn test_dead_reckoning() {
        let mut pt = seeded(5.0);

        // 2 deg/ms over 10 ms
        let (out, _) = pt.proc(&input(10.0, Clockwise)).unwrap();
        assert_eq!(out, None);
        assert!((pt.az_deg() - 20.0).abs() < 1e-9);

        // Stopped time doesn't move the dome
        pt.proc(&input(50.0, Stopped)).unwrap();
        assert!((pt.az_deg() - 20.0).abs() < 1e-9);

        // Counter-clockwise across the seam
        pt.proc(&input(65.0, CounterClockwise)).unwrap();
        assert!((pt.az_deg() - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_cw_impulse_snap() {
        let mut pt = seeded(5.0);

        // Dead reckoning says 4 degrees, the impulse says 5
        pt.proc(&input(2.0, Clockwise)).unwrap();
        let (_, report) = pt
            .proc(&InputData {
                impulse: true,
                ..input(2.0, Clockwise)
            })
            .unwrap();

        assert!(report.impulse_snapped);
        assert_eq!(pt.az_deg(), 5.0);
        assert_eq!(pt.predictors_deg(), (95.0, 5.0));

        // Falling edge while rotating CW is ignored
        let (_, report) = pt.proc(&input(3.0, Clockwise)).unwrap();
        assert!(!report.impulse_snapped);
        assert!((pt.az_deg() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_ccw_impulse_snap() {
        let mut pt = seeded(5.0);

        pt.proc(&InputData {
            impulse: true,
            ..input(0.0, Stopped)
        })
        .unwrap();

        // Leaving the impulse counter-clockwise from home falls at 275
        let (_, report) = pt.proc(&input(20.0, CounterClockwise)).unwrap();
        assert!(report.impulse_snapped);
        assert_eq!(pt.az_deg(), 275.0);
        assert_eq!(pt.predictors_deg(), (-85.0, -175.0));
    }

    #[test]
    fn test_predictors_one_step_apart() {
        let mut pt = seeded(5.0);
        let mut now = 0.0;
        let mut impulse = false;

        // Toggle the impulse sensor every cycle, reversing every six cycles
        for i in 0..200 {
            now += 5.0;
            impulse = !impulse;
            let direction = if (i / 6) % 2 == 0 {
                Clockwise
            } else {
                CounterClockwise
            };

            pt.proc(&InputData {
                now_ms: now,
                impulse,
                home: false,
                direction,
            })
            .unwrap();

            let (cw, ccw) = pt.predictors_deg();
            assert!((cw - ccw - 90.0).abs() < 1e-9);
            assert!(pt.az_deg() >= 0.0 && pt.az_deg() < 360.0);
        }
    }

    #[test]
    fn test_home_resets() {
        let mut pt = seeded(5.0);

        pt.proc(&InputData {
            home: false,
            ..input(0.0, Stopped)
        })
        .unwrap();
        pt.proc(&input(170.0, Clockwise)).unwrap();
        assert!((pt.az_deg() - 340.0).abs() < 1e-9);

        // Home arrives while the estimate is 18 degrees short, impulse in the same cycle is
        // overridden
        let (_, report) = pt
            .proc(&InputData {
                home: true,
                impulse: true,
                ..input(171.0, Clockwise)
            })
            .unwrap();

        assert!(report.home_crossed);
        assert_eq!(pt.az_deg(), 0.0);
        assert_eq!(pt.predictors_deg(), (5.0, -85.0));

        // Staying in home doesn't snap again
        pt.proc(&InputData {
            home: true,
            impulse: true,
            ..input(172.0, Clockwise)
        })
        .unwrap();
        assert!((pt.az_deg() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_home_aligned_impulse() {
        let mut pt = seeded(0.0);
        assert_eq!(pt.predictors_deg(), (0.0, -90.0));

        pt.proc(&input(0.0, Stopped)).unwrap();
        pt.proc(&input(170.0, Clockwise)).unwrap();
        pt.proc(&InputData {
            home: true,
            impulse: true,
            ..input(180.0, Clockwise)
        })
        .unwrap();

        assert_eq!(pt.az_deg(), 0.0);
        assert_eq!(pt.predictors_deg(), (90.0, 0.0));

        // Seeding on an asserted aligned impulse also skips it
        let mut pt = PosTrack::new();
        pt.init(InitData {
            consts: consts(0.0),
            now_ms: 0.0,
            impulse: true,
            home: true,
        })
        .unwrap();
        assert_eq!(pt.predictors_deg(), (90.0, 0.0));
    }

    #[test]
    fn test_arrival() {
        let mut pt = seeded(5.0);
        pt.proc(&input(44.0, Clockwise)).unwrap();
        assert!((pt.az_deg() - 88.0).abs() < 1e-9);

        pt.set_target(90.0);
        let (out, report) = pt.proc(&input(46.0, Clockwise)).unwrap();

        assert_eq!(out, Some(Stopped));
        assert!(report.arrived);
        assert_eq!(pt.target_deg(), None);

        // Nothing further demanded
        let (out, _) = pt.proc(&input(47.0, Stopped)).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_demand_direction() {
        let mut pt = seeded(5.0);

        pt.set_target(100.0);
        let (out, _) = pt.proc(&input(0.0, Stopped)).unwrap();
        assert_eq!(out, Some(Clockwise));

        pt.set_target(-100.0);
        assert_eq!(pt.target_deg(), Some(260.0));
        let (out, _) = pt.proc(&input(0.0, Stopped)).unwrap();
        assert_eq!(out, Some(CounterClockwise));

        // Landing exactly on the target counts as arrival
        pt.set_target(0.0);
        let (out, report) = pt.proc(&input(0.0, Stopped)).unwrap();
        assert_eq!(out, Some(Stopped));
        assert!(report.arrived);

        pt.set_target(45.0);
        pt.clear_target();
        let (out, _) = pt.proc(&input(0.0, Stopped)).unwrap();
        assert_eq!(out, None);
    }
}
