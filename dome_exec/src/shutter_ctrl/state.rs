//! Implementations for the ShutterCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{CmdOutcome, ShutterDemand, ShutterState};
use comms_if::tc::ShutterOp;
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shutter control module state
#[derive(Debug, Default)]
pub struct ShutterCtrl {
    state: ShutterState,

    /// Raised when a motion was interrupted, or the limit switches disagree.
    alert: bool,
}

/// Levels of the shutter limit switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    pub is_open: bool,
    pub is_closed: bool,
}

/// Status report for ShutterCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The shutter reached a limit this cycle.
    pub limit_reached: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for ShutterCtrl {
    type InitData = InputData;
    type InitError = Infallible;

    type InputData = InputData;
    type OutputData = Option<ShutterDemand>;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Take the initial state from the limit switches.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        self.alert = false;
        self.state = match (init_data.is_open, init_data.is_closed) {
            (true, false) => ShutterState::Open,
            (false, true) => ShutterState::Closed,
            (false, false) => ShutterState::Stopped,
            (true, true) => {
                warn!("Both shutter limit switches are asserted");
                self.alert = true;
                ShutterState::Stopped
            }
        };

        info!("Shutter is {:?}", self.state);

        Ok(())
    }

    /// Advance the state machine by one cycle.
    ///
    /// Moving states keep demanding their motion until the limit is reached, `Stopped` keeps
    /// demanding a stop. `Open` and `Closed` demand nothing.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let mut report = StatusReport::default();

        let demand = match self.state {
            ShutterState::Opening if input_data.is_open => {
                info!("Shutter open");
                self.state = ShutterState::Open;
                report.limit_reached = true;
                Some(ShutterDemand::Stop)
            }
            ShutterState::Opening => Some(ShutterDemand::Open),
            ShutterState::Closing if input_data.is_closed => {
                info!("Shutter closed");
                self.state = ShutterState::Closed;
                report.limit_reached = true;
                Some(ShutterDemand::Stop)
            }
            ShutterState::Closing => Some(ShutterDemand::Close),
            ShutterState::Stopped => Some(ShutterDemand::Stop),
            ShutterState::Open | ShutterState::Closed => None,
        };

        Ok((demand, report))
    }
}

impl ShutterCtrl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ShutterState {
        self.state
    }

    pub fn alert(&self) -> bool {
        self.alert
    }

    /// Request the shutter to open or close. Clears any alert.
    pub fn command(&mut self, op: ShutterOp) -> CmdOutcome {
        self.alert = false;

        let (target, moving, demand) = match op {
            ShutterOp::Open => (ShutterState::Open, ShutterState::Opening, ShutterDemand::Open),
            ShutterOp::Close => (ShutterState::Closed, ShutterState::Closing, ShutterDemand::Close),
        };

        if self.state == target {
            debug!("Shutter already {:?}", target);
            return CmdOutcome::AlreadySatisfied;
        }

        debug!("Shutter {:?} -> {:?}", self.state, moving);
        self.state = moving;
        CmdOutcome::InProgress(demand)
    }

    /// Interrupt any shutter motion, raising the alert if the shutter was moving.
    ///
    /// The caller is responsible for stopping the actuator.
    pub fn abort(&mut self) {
        if matches!(self.state, ShutterState::Opening | ShutterState::Closing) {
            warn!("Shutter motion aborted while {:?}", self.state);
            self.state = ShutterState::Stopped;
            self.alert = true;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn shutter(is_open: bool, is_closed: bool) -> ShutterCtrl {
        let mut s = ShutterCtrl::new();
        s.init(InputData { is_open, is_closed }).unwrap();
        s
    }

    #[test]
    fn test_initial_state() {
        assert_eq!(shutter(true, false).state(), ShutterState::Open);
        assert_eq!(shutter(false, true).state(), ShutterState::Closed);
        assert_eq!(shutter(false, false).state(), ShutterState::Stopped);

        let s = shutter(true, true);
        assert_eq!(s.state(), ShutterState::Stopped);
        assert!(s.alert());
    }

    #[test]
    fn test_open_cycle() {
        let mut s = shutter(false, true);

        // Closed shutter demands nothing
        assert_eq!(s.proc(&InputData::default()).unwrap().0, None);

        assert_eq!(
            s.command(ShutterOp::Open),
            CmdOutcome::InProgress(ShutterDemand::Open)
        );
        assert_eq!(s.state(), ShutterState::Opening);

        // Keep driving until the limit switch
        let moving = InputData::default();
        assert_eq!(s.proc(&moving).unwrap().0, Some(ShutterDemand::Open));
        assert_eq!(s.proc(&moving).unwrap().0, Some(ShutterDemand::Open));

        let (demand, report) = s
            .proc(&InputData {
                is_open: true,
                is_closed: false,
            })
            .unwrap();
        assert_eq!(demand, Some(ShutterDemand::Stop));
        assert!(report.limit_reached);
        assert_eq!(s.state(), ShutterState::Open);

        assert_eq!(s.command(ShutterOp::Open), CmdOutcome::AlreadySatisfied);
    }

    #[test]
    fn test_reverse_mid_travel() {
        let mut s = shutter(false, true);
        s.command(ShutterOp::Open);

        assert_eq!(
            s.command(ShutterOp::Close),
            CmdOutcome::InProgress(ShutterDemand::Close)
        );
        assert_eq!(s.state(), ShutterState::Closing);

        // The closed switch is still asserted, so closing completes at once
        let (demand, _) = s
            .proc(&InputData {
                is_open: false,
                is_closed: true,
            })
            .unwrap();
        assert_eq!(demand, Some(ShutterDemand::Stop));
        assert_eq!(s.state(), ShutterState::Closed);
    }

    #[test]
    fn test_abort() {
        let mut s = shutter(false, true);
        s.command(ShutterOp::Open);
        s.abort();

        assert_eq!(s.state(), ShutterState::Stopped);
        assert!(s.alert());
        assert_eq!(
            s.proc(&InputData::default()).unwrap().0,
            Some(ShutterDemand::Stop)
        );

        // A new command clears the alert
        s.command(ShutterOp::Close);
        assert!(!s.alert());

        // Aborting a shutter at rest is not an alert
        let mut s = shutter(true, false);
        s.abort();
        assert_eq!(s.state(), ShutterState::Open);
        assert!(!s.alert());
    }
}
