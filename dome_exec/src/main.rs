//! Main dome executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Connect to the dome, calibrating or homing it
//!     - Main loop:
//!         - Telecommand processing and handling
//!         - Dome tick (position tracking and shutter control)
//!         - Persist new calibration constants
//!         - Telemetry
//!
//! # Modules
//!
//! All cyclic modules (e.g. `pos_track`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
use dome_lib::hal::{rpi::RpiIo, SysClock};
use dome_lib::{
    calib::CalibConsts,
    dome_ctrl::{DomeCtrl, DomeDriver},
    hal::{
        sim::{SimClock, SimDome},
        Clock, DomeIo,
    },
    params::{DomeExecParams, CALIB_FILE, EXEC_PARAMS_FILE, NET_PARAMS_FILE},
    tc_server::{TcServer, TcServerError},
    tm_server::TmServer,
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
#[cfg(not(target_arch = "arm"))]
use color_eyre::eyre::eyre;
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::net::NetParams;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params::LoadError,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTURES
// ---------------------------------------------------------------------------

/// Observatory dome controller
#[derive(Debug, StructOpt)]
#[structopt(name = "dome_exec")]
struct Opt {
    /// Drive the simulated dome instead of the GPIO header
    #[structopt(long)]
    sim: bool,

    /// Ignore stored calibration constants and calibrate on connect
    #[structopt(long)]
    recalibrate: bool,

    /// Telecommand script to run instead of listening for remote telecommands
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    Remote(TcServer),
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("dome_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Dome Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("Options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: DomeExecParams =
        util::params::load(EXEC_PARAMS_FILE).wrap_err("Could not load exec params")?;
    let net_params: NetParams =
        util::params::load(NET_PARAMS_FILE).wrap_err("Could not load net params")?;

    let stored_consts = if opt.recalibrate {
        info!("Stored calibration ignored, the dome will be calibrated");
        None
    } else {
        load_calib()
    };

    info!("Exec parameters loaded");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let tc_source = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        }
        None => {
            info!("No script provided, remote control via the TcServer will be used\n");
            TcSource::Remote(
                TcServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TcServer")?,
            )
        }
    };

    let mut tm_server =
        TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer initialised");

    // ---- DOME ----

    if opt.sim {
        info!("Using the simulated dome");
        let clock = SimClock::real_time();
        let dome = SimDome::new(exec_params.sim.clone(), clock.clone());
        let ctrl = DomeCtrl::new(dome, clock, exec_params.ctrl.clone(), stored_consts);

        return run(ctrl, tc_source, &mut tm_server, &exec_params, stored_consts);
    }

    run_gpio(tc_source, &mut tm_server, &exec_params, stored_consts)
}

/// Run the dome wired to the Raspberry Pi's GPIO header.
#[cfg(target_arch = "arm")]
fn run_gpio(
    tc_source: TcSource,
    tm_server: &mut TmServer,
    exec_params: &DomeExecParams,
    stored_consts: Option<CalibConsts>,
) -> Result<(), Report> {
    let io = RpiIo::new(&exec_params.gpio).wrap_err("Failed to set up the GPIO pins")?;
    let ctrl = DomeCtrl::new(io, SysClock::new(), exec_params.ctrl.clone(), stored_consts);

    run(ctrl, tc_source, tm_server, exec_params, stored_consts)
}

#[cfg(not(target_arch = "arm"))]
fn run_gpio(
    _tc_source: TcSource,
    _tm_server: &mut TmServer,
    _exec_params: &DomeExecParams,
    _stored_consts: Option<CalibConsts>,
) -> Result<(), Report> {
    Err(eyre!(
        "GPIO hardware is only supported on the Raspberry Pi, use --sim to run the simulation"
    ))
}

/// Connect to the dome and run the main loop until the script ends or a fatal error occurs.
fn run<I: DomeIo, C: Clock>(
    mut ctrl: DomeCtrl<I, C>,
    mut tc_source: TcSource,
    tm_server: &mut TmServer,
    exec_params: &DomeExecParams,
    mut saved_consts: Option<CalibConsts>,
) -> Result<(), Report> {
    ctrl.connect().wrap_err("Failed to connect to the dome")?;
    persist_calib(&ctrl, &mut saved_consts);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.tick_period_ms / 1000.0);
    let tm_every_n_ticks = exec_params.tm_every_n_ticks.max(1);
    let loop_start = Instant::now();
    let mut num_ticks: u64 = 0;
    let mut client_connected = false;

    loop {
        let cycle_start = Instant::now();

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::Remote(ref server) => {
                if server.is_connected() != client_connected {
                    client_connected = !client_connected;
                    match client_connected {
                        true => info!("TC client connected"),
                        false => warn!("TC client disconnected"),
                    }
                }

                match server.receive_tc() {
                    Ok(Some(tc)) => {
                        let response = match tc_processor::exec(&mut ctrl, &tc) {
                            Ok(r) => r,
                            Err(e) => return fatal(&mut ctrl, e, "executing a telecommand"),
                        };

                        if let Err(e) = server.send_response(response) {
                            warn!("Could not respond to TC: {}", e)
                        }
                    }
                    Ok(None) => (),
                    Err(TcServerError::TcParseError(e)) => {
                        warn!("Could not parse recieved TC: {}", e)
                    }
                    Err(e) => warn!("TcServer error: {}", e),
                }
            }

            TcSource::Script(ref mut si) => {
                match si.get_pending_tcs_at(loop_start.elapsed().as_secs_f64()) {
                    PendingTcs::None => (),
                    PendingTcs::Some(tc_vec) => {
                        for tc in tc_vec.iter() {
                            if let Err(e) = tc_processor::exec(&mut ctrl, tc) {
                                return fatal(&mut ctrl, e, "executing a telecommand");
                            }
                        }
                    }
                    PendingTcs::EndOfScript => {
                        info!("End of TC script reached, stopping");
                        break;
                    }
                }
            }
        }

        // ---- DOME PROCESSING ----

        // A failed recalibration leaves the dome disconnected, TCs are then refused until restart
        if ctrl.is_connected() {
            if let Err(e) = ctrl.tick() {
                return fatal(&mut ctrl, e, "the dome tick");
            }
        }

        persist_calib(&ctrl, &mut saved_consts);

        // ---- TELEMETRY ----

        if num_ticks % tm_every_n_ticks == 0 {
            if let Err(e) = tm_server.send(&ctrl.telemetry()) {
                warn!("TmServer error: {}", e)
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }

        num_ticks += 1;
    }

    // ---- SHUTDOWN ----

    ctrl.disconnect().wrap_err("Failed to stop the dome")?;

    info!("End of execution");

    Ok(())
}

/// Make a best-effort stop of the dome and return the error which ended execution.
fn fatal<I: DomeIo, C: Clock>(
    ctrl: &mut DomeCtrl<I, C>,
    err: dome_lib::dome_ctrl::DomeError,
    during: &str,
) -> Result<(), Report> {
    error!("Fatal error during {}: {}", during, err);

    if let Err(e) = ctrl.abort() {
        error!("Could not stop the dome: {}", e);
    }

    Err(err).wrap_err(format!("Fatal error during {}", during))
}

/// Load the stored calibration constants, if there are any.
fn load_calib() -> Option<CalibConsts> {
    match util::params::load::<CalibConsts>(CALIB_FILE) {
        Ok(c) => {
            info!("Loaded stored calibration: {:?}", c);
            Some(c)
        }
        Err(LoadError::FileLoadError(_)) => {
            info!("No stored calibration, the dome will be calibrated");
            None
        }
        Err(e) => {
            warn!("Stored calibration ignored: {}", e);
            None
        }
    }
}

/// Save the controller's calibration constants if they differ from the last saved ones.
fn persist_calib<I: DomeIo, C: Clock>(
    ctrl: &DomeCtrl<I, C>,
    saved_consts: &mut Option<CalibConsts>,
) {
    let consts = match ctrl.consts() {
        Some(c) if Some(c) != *saved_consts => c,
        _ => return,
    };

    match util::params::save(CALIB_FILE, &consts) {
        Ok(()) => info!("Calibration saved to {}", CALIB_FILE),
        Err(e) => warn!("Could not save the calibration: {}", e),
    }

    // Not retried on failure, the next calibration will try again
    *saved_consts = Some(consts);
}
