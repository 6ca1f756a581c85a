//! Worker thread which runs the solver continuously without blocking the exec thread.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, trace, warn};
use serde::Serialize;
use util::{archive::Archiver, session, time::std_duration_to_millis};

use crate::{
    model::{Feasibility, InputValidity, PathModelItem, Trajectory},
    param_builder::{self, BuildReport},
    solver::Solver,
};

use super::{ComputeError, ComputePhase, ComputeSignal, Shared};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One row of the solve archive.
#[derive(Debug, Serialize)]
struct SolveRecord {
    iteration: u64,
    session_time_s: f64,
    build_ms: f64,
    solve_ms: f64,
    residual_m: f64,
    feasible: bool,
    solver_iterations: usize,
    n_obs: usize,
    n_halfspaces: usize,
    n_waypoints: usize,
    num_dropped: usize,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn worker_thread(
    shared: Arc<Shared>,
    solver: Box<dyn Solver>,
    archiver: Archiver,
) -> Result<(), ComputeError> {
    info!("Compute loop started");

    let result = run(&shared, solver, archiver);

    shared.set_phase(ComputePhase::Idle);

    match result {
        Ok(()) => info!("Compute loop stopped"),
        Err(ref e) => error!("Compute loop stopped on an error: {}", e),
    }

    result
}

/// Iterate until a stop is requested.
///
/// The periods have been validated with the parameters.
fn run(
    shared: &Shared,
    mut solver: Box<dyn Solver>,
    mut archiver: Archiver,
) -> Result<(), ComputeError> {
    let min_period = Duration::from_secs_f64(shared.params.min_period_s);
    let idle_period = Duration::from_secs_f64(shared.params.idle_period_s);

    let mut last_num_dropped = 0;

    while !shared.stop.load(Ordering::Relaxed) {
        let iter_start = Instant::now();

        // ---- BUILDING ----

        shared.set_phase(ComputePhase::Building);

        let num_overlaps = shared.model.refresh_overlaps()?;
        let snapshot = shared.model.snapshot()?;

        let validity = param_builder::validate(&snapshot);
        if shared.model.set_input_validity(validity)? {
            debug!("Input validity changed to {:?}", validity);
            shared.raise(ComputeSignal::InputChanged(validity))?;
        }

        if validity != InputValidity::Valid {
            shared.set_phase(ComputePhase::Idle);
            thread::sleep(idle_period);
            continue;
        }

        let (params, report) = match param_builder::build(&snapshot) {
            Ok(p) => p,
            Err(e) => {
                // Validation already checks the drone and target, so this can only be an edit
                // racing the snapshot
                debug!("Could not build solver parameters: {}", e);
                shared.set_phase(ComputePhase::Idle);
                thread::sleep(idle_period);
                continue;
            }
        };

        if report.num_dropped() != last_num_dropped {
            warn!(
                "Solver capacity exceeded, {} obstacles, {} half-spaces and {} waypoints are \
                 not being used",
                report.n_obs_dropped, report.n_halfspaces_dropped, report.n_waypoints_dropped
            );
            last_num_dropped = report.num_dropped();
        }

        let build_dur = iter_start.elapsed();

        // ---- SOLVING ----

        shared.set_phase(ComputePhase::Solving);

        let solve_start = Instant::now();
        let output = solver.solve(params);
        let solve_dur = solve_start.elapsed();

        // ---- PUBLISHING ----

        shared.set_phase(ComputePhase::Publishing);

        let residual_m = output.residual_m;
        let solver_iterations = output.iterations;
        let feasibility = if residual_m <= shared.params.feasibility_tol_m {
            Feasibility::Feasible
        } else {
            Feasibility::Infeasible
        };
        let message = solver_message(feasibility, residual_m, num_overlaps);

        let traj = Trajectory::from(output);
        let path = PathModelItem::from_trajectory(&traj);

        let iteration = shared.iterations.fetch_add(1, Ordering::Relaxed) + 1;

        if shared.model.publish(traj, path, feasibility, message)? {
            info!("Trajectory is now {:?}", feasibility);
        }

        shared.raise(ComputeSignal::TrajUpdated {
            iteration,
            feasibility,
        })?;

        trace!(
            "Iteration {}: build {:.03} ms, solve {:.03} ms, residual {:.04} m",
            iteration,
            std_duration_to_millis(build_dur),
            std_duration_to_millis(solve_dur),
            residual_m
        );

        archive(
            &mut archiver,
            iteration,
            build_dur,
            solve_dur,
            residual_m,
            feasibility,
            solver_iterations,
            &report,
        );

        // ---- IDLE ----

        shared.set_phase(ComputePhase::Idle);

        if let Some(remaining) = min_period.checked_sub(iter_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    Ok(())
}

fn solver_message(feasibility: Feasibility, residual_m: f64, num_overlaps: usize) -> String {
    let mut msg = match feasibility {
        Feasibility::Feasible => String::from("Feasible"),
        _ => format!("Infeasible, target missed by {:.02} m", residual_m),
    };

    if num_overlaps > 0 {
        msg.push_str(&format!(" ({} overlapping obstacles)", num_overlaps));
    }

    msg
}

#[allow(clippy::too_many_arguments)]
fn archive(
    archiver: &mut Archiver,
    iteration: u64,
    build_dur: Duration,
    solve_dur: Duration,
    residual_m: f64,
    feasibility: Feasibility,
    solver_iterations: usize,
    report: &BuildReport,
) {
    if !archiver.is_enabled() {
        return;
    }

    let session_time_s = if session::is_initialised() {
        session::get_elapsed_seconds()
    } else {
        0.0
    };

    let record = SolveRecord {
        iteration,
        session_time_s,
        build_ms: std_duration_to_millis(build_dur),
        solve_ms: std_duration_to_millis(solve_dur),
        residual_m,
        feasible: feasibility == Feasibility::Feasible,
        solver_iterations,
        n_obs: report.n_obs,
        n_halfspaces: report.n_halfspaces,
        n_waypoints: report.n_waypoints,
        num_dropped: report.num_dropped(),
    };

    if let Err(e) = archiver.serialise(record) {
        warn!("Could not archive solve record: {}", e);
    }
}
