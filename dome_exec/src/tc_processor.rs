//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use comms_if::tc::{Tc, TcResponse};
use dome_lib::dome_ctrl::{CmdState, DomeDriver, DomeError};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand on the dome.
///
/// Rejected commands are answered with `CannotExecute`. Hardware faults are returned as errors,
/// and must be treated as fatal by the caller.
pub(crate) fn exec<D: DomeDriver>(dome: &mut D, tc: &Tc) -> Result<TcResponse, DomeError> {
    debug!("Recieved {:?}", tc);

    let result = match *tc {
        Tc::Heartbeat => Ok(CmdState::Ok),
        Tc::MoveAbs { az_deg } if !az_deg.is_finite() => return Ok(TcResponse::Invalid),
        Tc::MoveRel { delta_deg } if !delta_deg.is_finite() => return Ok(TcResponse::Invalid),
        Tc::MoveAbs { az_deg } => dome.move_abs(az_deg),
        Tc::MoveRel { delta_deg } => dome.move_rel(delta_deg),
        Tc::MoveDir { dir, cmd } => dome.move_dir(dir, cmd),
        Tc::Shutter { op } => dome.control_shutter(op),
        Tc::Park => dome.park(),
        Tc::Unpark => dome.unpark(),
        Tc::Abort => dome.abort().map(|_| CmdState::Ok),
        Tc::Calibrate => dome.recalibrate().map(|_| CmdState::Ok),
    };

    match result {
        Ok(CmdState::Ok) => Ok(TcResponse::Ok),
        Ok(CmdState::Busy) => Ok(TcResponse::Busy),
        Err(e) if e.is_hardware_fault() => Err(e),
        Err(e) => {
            warn!("Cannot execute {:?}: {}", tc, e);
            Ok(TcResponse::CannotExecute)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::{DomeDirection, MotionCmd, ShutterOp};
    use dome_lib::{
        act_ctrl::RotationDirection,
        calib::CalibConsts,
        dome_ctrl::DomeTm,
        hal::HwError,
        shutter_ctrl::ShutterState,
    };

    /// Records the calls made to it and answers according to its flags.
    #[derive(Default)]
    struct FakeDome {
        calls: Vec<String>,
        parked: bool,
        hw_fault: bool,
    }

    impl FakeDome {
        fn answer(&mut self, call: String) -> Result<CmdState, DomeError> {
            self.calls.push(call);
            if self.hw_fault {
                Err(DomeError::Hardware(HwError::GpioSetup {
                    pin: 5,
                    reason: "gone".into(),
                }))
            } else if self.parked {
                Err(DomeError::Parked)
            } else {
                Ok(CmdState::Busy)
            }
        }
    }

    impl DomeDriver for FakeDome {
        fn connect(&mut self) -> Result<(), DomeError> {
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), DomeError> {
            Ok(())
        }

        fn tick(&mut self) -> Result<(), DomeError> {
            Ok(())
        }

        fn move_rel(&mut self, delta_deg: f64) -> Result<CmdState, DomeError> {
            self.answer(format!("move_rel {}", delta_deg))
        }

        fn move_abs(&mut self, az_deg: f64) -> Result<CmdState, DomeError> {
            self.answer(format!("move_abs {}", az_deg))
        }

        fn move_dir(&mut self, dir: DomeDirection, cmd: MotionCmd) -> Result<CmdState, DomeError> {
            self.answer(format!("move_dir {:?} {:?}", dir, cmd))
        }

        fn control_shutter(&mut self, op: ShutterOp) -> Result<CmdState, DomeError> {
            self.answer(format!("shutter {:?}", op))
        }

        fn park(&mut self) -> Result<CmdState, DomeError> {
            self.calls.push("park".into());
            Ok(CmdState::Ok)
        }

        fn unpark(&mut self) -> Result<CmdState, DomeError> {
            self.answer("unpark".into())
        }

        fn abort(&mut self) -> Result<(), DomeError> {
            self.calls.push("abort".into());
            Ok(())
        }

        fn recalibrate(&mut self) -> Result<CalibConsts, DomeError> {
            self.answer("recalibrate".into())?;
            Ok(CalibConsts {
                impulses_per_rev: 20,
                speed_cw_deg_ms: 0.006,
                speed_ccw_deg_ms: 0.0055,
                home_to_impulse_offset_deg: 4.0,
            })
        }

        fn telemetry(&self) -> DomeTm {
            DomeTm {
                timestamp: chrono::Utc::now(),
                az_deg: 0.0,
                direction: RotationDirection::Stopped,
                target_deg: None,
                shutter: ShutterState::Closed,
                shutter_alert: false,
                parked: self.parked,
                connected: true,
                calib: None,
            }
        }
    }

    #[test]
    fn test_dispatch() {
        let mut dome = FakeDome::default();

        assert_eq!(exec(&mut dome, &Tc::Heartbeat).unwrap(), TcResponse::Ok);
        assert_eq!(
            exec(&mut dome, &Tc::MoveAbs { az_deg: 90.0 }).unwrap(),
            TcResponse::Busy
        );
        assert_eq!(
            exec(
                &mut dome,
                &Tc::MoveDir {
                    dir: DomeDirection::Ccw,
                    cmd: MotionCmd::Start
                }
            )
            .unwrap(),
            TcResponse::Busy
        );
        assert_eq!(exec(&mut dome, &Tc::Park).unwrap(), TcResponse::Ok);
        assert_eq!(exec(&mut dome, &Tc::Abort).unwrap(), TcResponse::Ok);
        assert_eq!(exec(&mut dome, &Tc::Calibrate).unwrap(), TcResponse::Ok);

        assert_eq!(
            dome.calls,
            vec![
                "move_abs 90",
                "move_dir Ccw Start",
                "park",
                "abort",
                "recalibrate"
            ]
        );
    }

    #[test]
    fn test_rejections() {
        let mut dome = FakeDome {
            parked: true,
            ..Default::default()
        };

        assert_eq!(
            exec(&mut dome, &Tc::MoveRel { delta_deg: 10.0 }).unwrap(),
            TcResponse::CannotExecute
        );
        assert_eq!(
            exec(&mut dome, &Tc::MoveAbs { az_deg: f64::NAN }).unwrap(),
            TcResponse::Invalid
        );
        assert_eq!(dome.calls, vec!["move_rel 10"]);

        dome.hw_fault = true;
        assert!(matches!(
            exec(&mut dome, &Tc::Shutter { op: ShutterOp::Open }),
            Err(DomeError::Hardware(_))
        ));
    }
}
