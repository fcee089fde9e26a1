//! Implementations for the DomeCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};

// Internal
use super::{CmdState, DomeDriver, DomeError, DomeTm, Params};
use crate::{
    act_ctrl::{ActCtrl, RotationDirection},
    calib::{self, CalibConsts},
    hal::{Clock, DomeIo, SensorId},
    pos_track::{self, PosTrack},
    shutter_ctrl::{self, CmdOutcome, ShutterCtrl, ShutterDemand},
};
use comms_if::tc::{DomeDirection, MotionCmd, ShutterOp};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Dome controller
pub struct DomeCtrl<I: DomeIo, C: Clock> {
    params: Params,

    act: ActCtrl<I>,
    clock: C,

    pos_track: PosTrack,
    shutter: ShutterCtrl,

    /// Constants to home with instead of calibrating, replaced by every successful calibration.
    consts: Option<CalibConsts>,

    connected: bool,
    parked: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<I: DomeIo, C: Clock> DomeCtrl<I, C> {
    /// Create a disconnected controller.
    ///
    /// If `stored_consts` are given and consistent, [`DomeDriver::connect`] only homes the dome
    /// instead of running a full calibration.
    pub fn new(io: I, clock: C, params: Params, stored_consts: Option<CalibConsts>) -> Self {
        Self {
            params,
            act: ActCtrl::new(io),
            clock,
            pos_track: PosTrack::new(),
            shutter: ShutterCtrl::new(),
            consts: stored_consts,
            connected: false,
            parked: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// The constants currently in use, or stored for the next connect.
    pub fn consts(&self) -> Option<CalibConsts> {
        self.consts
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn try_connect(&mut self) -> Result<(), DomeError> {
        self.act.stop_all()?;

        if self.params.relay_check_ms > 0.0 {
            info!("Checking rotation relays");
            self.act.relay_check(&self.clock, self.params.relay_check_ms)?;
        }

        let limits = self.read_shutter_limits()?;
        self.shutter.init(limits).unwrap_or_else(|never| match never {});

        let consts = match self.consts {
            Some(c) if c.is_consistent() => {
                info!("Using stored calibration: {:?}", c);
                calib::find_home(&mut self.act, &self.clock, &self.params.calib)?;
                c
            }
            stored => {
                if stored.is_some() {
                    warn!("Stored calibration is inconsistent, recalibrating");
                }
                calib::calibrate(&mut self.act, &self.clock, &self.params.calib)?
            }
        };

        self.seed(consts)
    }

    /// Seed the position tracker at home with the given constants.
    fn seed(&mut self, consts: CalibConsts) -> Result<(), DomeError> {
        let init = pos_track::InitData {
            consts,
            now_ms: self.clock.now_ms(),
            impulse: self.act.read(SensorId::Impulse)?,
            home: self.act.read(SensorId::Home)?,
        };
        self.pos_track.init(init)?;
        self.consts = Some(consts);

        Ok(())
    }

    fn read_shutter_limits(&mut self) -> Result<shutter_ctrl::InputData, DomeError> {
        Ok(shutter_ctrl::InputData {
            is_open: self.act.read(SensorId::Open)?,
            is_closed: self.act.read(SensorId::Closed)?,
        })
    }

    fn apply_shutter(&mut self, demand: ShutterDemand) -> Result<(), DomeError> {
        match demand {
            ShutterDemand::Open => self.act.open_shutter(),
            ShutterDemand::Close => self.act.close_shutter(),
            ShutterDemand::Stop => self.act.stop_shutter(),
        }
        .map_err(DomeError::from)
    }

    fn shutter_cmd(&mut self, op: ShutterOp) -> Result<CmdState, DomeError> {
        match self.shutter.command(op) {
            CmdOutcome::AlreadySatisfied => Ok(CmdState::Ok),
            CmdOutcome::InProgress(demand) => {
                self.apply_shutter(demand)?;
                Ok(CmdState::Busy)
            }
        }
    }

    fn check_connected(&self) -> Result<(), DomeError> {
        match self.connected {
            true => Ok(()),
            false => Err(DomeError::NotConnected),
        }
    }

    /// Rotation is only possible while connected and unparked.
    fn check_motion_allowed(&self) -> Result<(), DomeError> {
        self.check_connected()?;
        match self.parked {
            true => Err(DomeError::Parked),
            false => Ok(()),
        }
    }
}

impl<I: DomeIo, C: Clock> DomeDriver for DomeCtrl<I, C> {
    fn connect(&mut self) -> Result<(), DomeError> {
        if self.connected {
            debug!("Connect requested while already connected");
            return Ok(());
        }

        info!("Connecting to the dome");

        match self.try_connect() {
            Ok(()) => {
                self.connected = true;
                info!("Dome connected");
                Ok(())
            }
            Err(e) => {
                if let Err(stop_err) = self.act.stop_all() {
                    warn!("Could not stop outputs after failed connect: {}", stop_err);
                }
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), DomeError> {
        info!("Disconnecting from the dome");

        self.pos_track.clear_target();
        self.shutter.abort();
        self.connected = false;

        self.act.stop_all().map_err(DomeError::from)
    }

    fn tick(&mut self) -> Result<(), DomeError> {
        self.check_connected()?;

        let now_ms = self.clock.now_ms();
        let impulse = self.act.read(SensorId::Impulse)?;
        let home = self.act.read(SensorId::Home)?;
        let limits = self.read_shutter_limits()?;

        // ---- ROTATION ----

        let (demand, report) = self.pos_track.proc(&pos_track::InputData {
            now_ms,
            impulse,
            home,
            direction: self.act.direction(),
        })?;

        if let Some(direction) = demand {
            self.act.rotate(direction)?;
        }

        if report.arrived {
            info!("Arrived, azimuth {:.2} deg", self.pos_track.az_deg());
        }

        trace!(
            "az {:.3} deg, {:?}, target {:?}",
            self.pos_track.az_deg(),
            self.act.direction(),
            self.pos_track.target_deg()
        );

        // ---- SHUTTER ----

        let (demand, _) = self
            .shutter
            .proc(&limits)
            .unwrap_or_else(|never| match never {});

        if let Some(d) = demand {
            self.apply_shutter(d)?;
        }

        Ok(())
    }

    fn move_rel(&mut self, delta_deg: f64) -> Result<CmdState, DomeError> {
        self.check_motion_allowed()?;

        let az_deg = self.pos_track.az_deg() + delta_deg;
        debug!("Relative move of {:.2} deg", delta_deg);
        self.move_abs(az_deg)
    }

    fn move_abs(&mut self, az_deg: f64) -> Result<CmdState, DomeError> {
        self.check_motion_allowed()?;

        self.pos_track.set_target(az_deg);
        debug!("Target azimuth set to {:.2?} deg", self.pos_track.target_deg());

        Ok(CmdState::Busy)
    }

    fn move_dir(&mut self, dir: DomeDirection, cmd: MotionCmd) -> Result<CmdState, DomeError> {
        match cmd {
            // Stopping is always allowed once connected, even when parked
            MotionCmd::Stop => {
                self.check_connected()?;
                debug!("Stopping continuous rotation");
                self.pos_track.clear_target();
                self.act.stop_rotation()?;
                Ok(CmdState::Ok)
            }
            MotionCmd::Start => {
                self.check_motion_allowed()?;
                debug!("Starting continuous {:?} rotation", dir);
                self.pos_track.clear_target();
                match dir {
                    DomeDirection::Cw => self.act.rotate_cw()?,
                    DomeDirection::Ccw => self.act.rotate_ccw()?,
                }
                Ok(CmdState::Busy)
            }
        }
    }

    fn control_shutter(&mut self, op: ShutterOp) -> Result<CmdState, DomeError> {
        self.check_connected()?;

        if self.parked && op == ShutterOp::Open {
            return Err(DomeError::Parked);
        }

        self.shutter_cmd(op)
    }

    fn park(&mut self) -> Result<CmdState, DomeError> {
        self.check_connected()?;

        info!("Parking");
        self.pos_track.clear_target();
        self.act.stop_rotation()?;
        self.parked = true;

        self.shutter_cmd(ShutterOp::Close)
    }

    fn unpark(&mut self) -> Result<CmdState, DomeError> {
        self.check_connected()?;

        info!("Unparking");
        self.parked = false;

        self.shutter_cmd(ShutterOp::Open)
    }

    fn abort(&mut self) -> Result<(), DomeError> {
        info!("Abort");

        self.pos_track.clear_target();
        self.shutter.abort();

        self.act.stop_all().map_err(DomeError::from)
    }

    fn recalibrate(&mut self) -> Result<CalibConsts, DomeError> {
        self.check_motion_allowed()?;

        info!("Recalibrating");

        // No tick runs until calibration returns, so nothing would watch the shutter limits
        self.pos_track.clear_target();
        self.shutter.abort();
        self.act.stop_all()?;

        let result = calib::calibrate(&mut self.act, &self.clock, &self.params.calib)
            .map_err(DomeError::from)
            .and_then(|consts| self.seed(consts).map(|_| consts));

        // The dome has moved away from the tracked position, which can't be recovered without
        // connecting again
        if let Err(ref e) = result {
            warn!("Recalibration failed, disconnecting: {}", e);
            self.connected = false;
        }

        result
    }

    fn telemetry(&self) -> DomeTm {
        DomeTm {
            timestamp: chrono::Utc::now(),
            az_deg: self.pos_track.az_deg(),
            direction: self.act.direction(),
            target_deg: self.pos_track.target_deg(),
            shutter: self.shutter.state(),
            shutter_alert: self.shutter.alert(),
            parked: self.parked,
            connected: self.connected,
            calib: self.pos_track.consts(),
        }
    }
}
