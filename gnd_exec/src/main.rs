//! Main ground station executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the constraint model from the parameters and an optional layout
//!     - Start the compute loop in its own thread
//!     - Main loop:
//!         - Telecommand processing
//!         - Compute loop signal handling
//!         - Trajectory playback or command sending
//!     - Stop the compute loop and optionally save the layout
//!
//! # Usage
//!
//! ```text
//! gnd_exec [--layout <file>] [--script <file>] [--duration <s>] [--save-layout <file>]
//!          [--params <file>]
//! ```
//!
//! Without a script or a duration the executable runs until it is killed.

// ------------------------------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ------------------------------------------------------------------------------------------------

use gnd_lib::{
    compute::ComputeLoop,
    data_store::DataStore,
    layout,
    model::ConstraintModel,
    params::ExecParams,
    solver::DirectSolver,
};

mod tc_processor;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of consecutive overruns after which the overrun warning is only given once a second
const OVERRUN_WARN_LIMIT: u64 = 20;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Ground station trajectory optimiser.
#[derive(Debug, StructOpt)]
#[structopt(name = "gnd_exec")]
struct Opt {
    /// Layout file to load into the model at startup
    #[structopt(short, long, parse(from_os_str))]
    layout: Option<PathBuf>,

    /// Telecommand script to execute, the executable stops at the end of the script
    #[structopt(short, long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Stop after this many seconds
    #[structopt(short, long)]
    duration: Option<f64>,

    /// Save the layout into this file on exit
    #[structopt(long, parse(from_os_str))]
    save_layout: Option<PathBuf>,

    /// Parameter file to use instead of `params/gnd_exec.toml`
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Log every compute iteration
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("gnd_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opt.verbose {
        true => LevelFilter::Trace,
        false => LevelFilter::Debug,
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Ground Station Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let params: ExecParams = match opt.params {
        Some(ref p) => util::params::load_from_path::<ExecParams, _>(p),
        None => util::params::load::<ExecParams>("gnd_exec.toml"),
    }
    .wrap_err("Could not load exec params")?;

    params.validate().wrap_err("Invalid exec params")?;

    info!("Exec parameters loaded");

    // ---- LOAD SCRIPT ----

    let mut script = match opt.script {
        Some(ref p) => {
            info!("Loading script from {:?}", p);

            let si = ScriptInterpreter::new(p).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            Some(si)
        }
        None => None,
    };

    // ---- INITIALISE MODEL ----

    let model = Arc::new(ConstraintModel::new(&params.model));

    if let Some(ref p) = opt.layout {
        layout::load_file(p)
            .wrap_err("Failed to load the layout")?
            .apply(&model)
            .wrap_err("Failed to apply the layout")?;
        model
            .refresh_overlaps()
            .wrap_err("Failed to check the layout for overlaps")?;
    }

    let mut ds = DataStore::new(
        model.clone(),
        params.traj_mgr.clone(),
        session.session_root.clone(),
    );

    info!("Model initialised");

    // ---- START COMPUTE LOOP ----

    let archiver = match params.compute.archive {
        true => Archiver::from_path(&session, "compute/solves.csv")
            .wrap_err("Failed to create the solve archive")?,
        false => Archiver::default(),
    };

    let compute = ComputeLoop::start(
        model,
        Box::new(DirectSolver::new()),
        params.compute.clone(),
        archiver,
    )
    .wrap_err("Failed to start the compute loop")?;

    info!("Compute loop started");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(params.cycle_period_s);

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        ds.cycle_start(session::get_elapsed_seconds());

        // ---- TELECOMMAND PROCESSING ----

        if let Some(ref mut si) = script {
            match si.get_pending_tcs(ds.sim_time_s) {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&mut ds, tc);
                    }
                }
                // Exit if end of script reached
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached, stopping");
                    break;
                }
            }
        }

        if let Some(d) = opt.duration {
            if ds.sim_time_s >= d {
                info!("Run duration of {:.02} s reached, stopping", d);
                break;
            }
        }

        // ---- COMPUTE LOOP SIGNALS ----

        match compute.signals() {
            Ok(signals) => ds.handle_signals(signals),
            Err(e) => warn!("Could not read compute loop signals: {}", e),
        }

        if !compute.is_running() {
            warn!("Compute loop has exited unexpectedly");
            break;
        }

        // ---- TRAJECTORY MANAGEMENT ----

        let now_s = ds.sim_time_s;
        if let Err(e) = ds.traj_mgr.step(now_s, &mut ds.sink) {
            warn!("Error during trajectory playback: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                ds.num_consec_cycle_overruns += 1;

                let cycles_per_s = (1.0 / params.cycle_period_s).ceil() as u64;
                if ds.num_consec_cycle_overruns < OVERRUN_WARN_LIMIT
                    || ds.num_consec_cycle_overruns % cycles_per_s.max(1) == 0
                {
                    warn!(
                        "Cycle overran by {:.06} s ({} consecutive)",
                        cycle_dur.as_secs_f64() - cycle_period.as_secs_f64(),
                        ds.num_consec_cycle_overruns
                    );
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("Stopping compute loop");
    let num_iterations = compute.iterations();
    compute.stop().wrap_err("Compute loop exited with an error")?;
    info!(
        "Compute loop stopped after {} trajectories, {} cycles executed",
        num_iterations, ds.num_cycles
    );

    if let Some(ref p) = opt.save_layout {
        layout::Layout::from_model(&ds.model)
            .wrap_err("Failed to read the layout from the model")
            .and_then(|l| layout::save_file(&l, p).wrap_err("Failed to save the layout"))?;
    }

    info!("End of execution");

    session.exit();

    Ok(())
}
