//! # Compute Loop
//!
//! Runs the solver continuously in a background thread. Each iteration moves through
//!
//! `Idle -> Building -> Solving -> Publishing -> Idle`
//!
//! Building takes a snapshot of the model and validates it, Solving calls the solver with no lock
//! held, and Publishing writes the new trajectory and its status back into the model in a single
//! locked section. The stop flag is checked at the start of each iteration, so stopping the loop
//! waits for at most one solve.
//!
//! The exec thread is told about new trajectories through a pending signal slot. Each kind of
//! signal keeps only its latest value until it is drained, so a slow exec thread always sees the
//! newest trajectory and the current input validity.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
};

use util::archive::Archiver;

use crate::{
    model::{ConstraintModel, Feasibility, InputValidity, ModelError},
    params::ParamsError,
    solver::Solver,
};

use self::worker::worker_thread;

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod worker;

pub use params::ComputeParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the running compute loop.
///
/// Dropping the handle asks the worker to stop but does not wait for it, use
/// [`ComputeLoop::stop`] to join the thread.
#[derive(Debug)]
pub struct ComputeLoop {
    shared: Arc<Shared>,

    worker_jh: Option<JoinHandle<Result<(), ComputeError>>>,
}

#[derive(Debug)]
struct Shared {
    params: ComputeParams,
    model: Arc<ConstraintModel>,

    stop: AtomicBool,
    phase: AtomicU8,
    iterations: AtomicU64,

    pending: Mutex<PendingSignals>,
}

/// Latest undrained value of each signal.
#[derive(Debug, Default)]
struct PendingSignals {
    input_changed: Option<InputValidity>,
    traj_updated: Option<(u64, Feasibility)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComputePhase {
    Idle = 0,
    Building = 1,
    Solving = 2,
    Publishing = 3,
}

/// Notifications sent from the compute loop to the exec thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeSignal {
    /// A new trajectory has been published into the model
    TrajUpdated {
        iteration: u64,
        feasibility: Feasibility,
    },

    /// The input validity code of the model changed
    InputChanged(InputValidity),
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Sync primitive is poisoned")]
    PoisonError,

    #[error("Could not spawn the compute thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The compute thread panicked")]
    WorkerPanicked,

    #[error("Invalid compute parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ComputeLoop {
    /// Start the compute loop on the given model.
    ///
    /// The archiver receives one record per solve, pass `Archiver::default()` to disable archiving.
    pub fn start(
        model: Arc<ConstraintModel>,
        solver: Box<dyn Solver>,
        params: ComputeParams,
        archiver: Archiver,
    ) -> Result<Self, ComputeError> {
        params.validate()?;

        let shared = Arc::new(Shared {
            params,
            model,
            stop: AtomicBool::new(false),
            phase: AtomicU8::new(ComputePhase::Idle as u8),
            iterations: AtomicU64::new(0),
            pending: Mutex::new(PendingSignals::default()),
        });
        let shared_worker = shared.clone();

        let worker_jh = thread::Builder::new()
            .name("compute::worker".into())
            .spawn(move || worker_thread(shared_worker, solver, archiver))
            .map_err(ComputeError::SpawnError)?;

        Ok(Self {
            shared,
            worker_jh: Some(worker_jh),
        })
    }

    /// Drain the signals raised since the last call.
    ///
    /// Only the latest signal of each kind is kept, an input change is given before a trajectory
    /// update.
    pub fn signals(&self) -> Result<Vec<ComputeSignal>, ComputeError> {
        let mut pending = self.shared.pending.lock()?;
        let mut signals = Vec::with_capacity(2);

        if let Some(validity) = pending.input_changed.take() {
            signals.push(ComputeSignal::InputChanged(validity));
        }
        if let Some((iteration, feasibility)) = pending.traj_updated.take() {
            signals.push(ComputeSignal::TrajUpdated {
                iteration,
                feasibility,
            });
        }

        Ok(signals)
    }

    pub fn phase(&self) -> ComputePhase {
        ComputePhase::from(self.shared.phase.load(Ordering::Relaxed))
    }

    /// Number of trajectories published so far.
    pub fn iterations(&self) -> u64 {
        self.shared.iterations.load(Ordering::Relaxed)
    }

    /// Returns true while the worker thread is still running.
    pub fn is_running(&self) -> bool {
        match self.worker_jh {
            Some(ref jh) => !jh.is_finished(),
            None => false,
        }
    }

    /// Ask the loop to stop after the current iteration without waiting for it.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }

    /// Stop the loop and wait for the worker thread to exit, returning the worker's result.
    pub fn stop(mut self) -> Result<(), ComputeError> {
        self.request_stop();

        match self.worker_jh.take() {
            Some(jh) => match jh.join() {
                Ok(r) => r,
                Err(_) => Err(ComputeError::WorkerPanicked),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ComputeLoop {
    fn drop(&mut self) {
        if self.worker_jh.is_some() {
            self.request_stop();
        }
    }
}

impl Shared {
    fn set_phase(&self, phase: ComputePhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Raise a signal, replacing any undrained signal of the same kind.
    fn raise(&self, signal: ComputeSignal) -> Result<(), ComputeError> {
        let mut pending = self.pending.lock()?;

        match signal {
            ComputeSignal::InputChanged(validity) => pending.input_changed = Some(validity),
            ComputeSignal::TrajUpdated {
                iteration,
                feasibility,
            } => pending.traj_updated = Some((iteration, feasibility)),
        }

        Ok(())
    }
}

impl From<u8> for ComputePhase {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Building,
            2 => Self::Solving,
            3 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

impl<G> From<PoisonError<G>> for ComputeError {
    fn from(_: PoisonError<G>) -> Self {
        Self::PoisonError
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::time::{Duration, Instant};

    use nalgebra::Vector2;

    use crate::{
        geom::{DroneEntity, EllipseConstraint, PointEntity},
        solver::{DirectSolver, SolverOutput, SolverParams},
    };

    /// Solver which always stops short of the target.
    struct ShortSolver;

    impl Solver for ShortSolver {
        fn solve(&mut self, params: SolverParams) -> SolverOutput {
            SolverOutput {
                positions_m: vec![params.start_pos_m; params.horizon],
                velocities_ms: vec![Vector2::zeros(); params.horizon],
                accels_mss: vec![Vector2::zeros(); params.horizon],
                dt_s: params.dt_s(),
                residual_m: (params.target_pos_m - params.start_pos_m).norm(),
                iterations: 1,
            }
        }
    }

    fn fast_params() -> ComputeParams {
        ComputeParams {
            feasibility_tol_m: 0.1,
            min_period_s: 0.001,
            idle_period_s: 0.001,
            archive: false,
        }
    }

    fn solvable_model() -> Result<Arc<ConstraintModel>, ModelError> {
        let model = Arc::new(ConstraintModel::default());
        model.add_drone(DroneEntity::new(Vector2::new(0.0, 0.0)))?;
        model.add_final_point(PointEntity::new(Vector2::new(800.0, -400.0)))?;
        Ok(model)
    }

    /// Poll until the condition holds or a generous timeout passes.
    fn wait_for<F: FnMut() -> bool>(mut cond: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_publishes_feasible() -> Result<(), Box<dyn std::error::Error>> {
        let model = solvable_model()?;
        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(DirectSolver::new()),
            fast_params(),
            Archiver::default(),
        )?;

        assert!(wait_for(|| cl.iterations() >= 3));
        assert!(cl.is_running());

        let signals = cl.signals()?;
        assert!(signals.contains(&ComputeSignal::InputChanged(InputValidity::Valid)));
        assert!(signals.iter().any(|s| matches!(
            s,
            ComputeSignal::TrajUpdated {
                feasibility: Feasibility::Feasible,
                ..
            }
        )));
        assert!(signals.len() <= 2);

        cl.stop()?;

        assert_eq!(model.feasibility()?, Feasibility::Feasible);
        assert_eq!(model.current_path()?.len(), model.horizon()?);
        assert_eq!(model.solver_message()?, "Feasible");

        Ok(())
    }

    #[test]
    fn test_infeasible_is_a_status() -> Result<(), Box<dyn std::error::Error>> {
        let model = solvable_model()?;
        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(ShortSolver),
            fast_params(),
            Archiver::default(),
        )?;

        assert!(wait_for(|| cl.iterations() >= 2));
        cl.stop()?;

        assert_eq!(model.feasibility()?, Feasibility::Infeasible);
        assert!(model.solver_message()?.starts_with("Infeasible"));

        Ok(())
    }

    #[test]
    fn test_invalid_input_idles() -> Result<(), Box<dyn std::error::Error>> {
        let model = Arc::new(ConstraintModel::default());
        model.add_drone(DroneEntity::new(Vector2::new(0.0, 0.0)))?;

        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(DirectSolver::new()),
            fast_params(),
            Archiver::default(),
        )?;

        let mut signals = Vec::new();
        assert!(wait_for(|| {
            signals.extend(cl.signals().unwrap_or_default());
            signals.contains(&ComputeSignal::InputChanged(InputValidity::NoTarget))
        }));
        assert_eq!(model.input_validity()?, InputValidity::NoTarget);
        assert_eq!(cl.iterations(), 0);

        // Target inside an obstacle is still not solvable
        let e = model.add_ellipse(EllipseConstraint::new(Vector2::new(500.0, 0.0), 50.0, 50.0))?;
        model.add_final_point(PointEntity::new(Vector2::new(500.0, 0.0)))?;
        assert!(wait_for(|| {
            signals.extend(cl.signals().unwrap_or_default());
            signals.contains(&ComputeSignal::InputChanged(InputValidity::TargetInObstacle))
        }));
        assert_eq!(cl.iterations(), 0);

        // Moving the obstacle away is picked up by the next iteration
        e.write()
            .map_err(|_| ModelError::PoisonError)?
            .set_position_px(Vector2::new(250.0, 300.0));
        assert!(wait_for(|| cl.iterations() >= 1));

        cl.stop()?;
        assert_eq!(model.input_validity()?, InputValidity::Valid);

        Ok(())
    }

    #[test]
    fn test_slow_consumer_sees_latest() -> Result<(), Box<dyn std::error::Error>> {
        let model = Arc::new(ConstraintModel::default());
        model.add_drone(DroneEntity::new(Vector2::new(0.0, 0.0)))?;
        let target = model.add_final_point(PointEntity::new(Vector2::new(800.0, -400.0)))?;

        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(DirectSolver::new()),
            fast_params(),
            Archiver::default(),
        )?;

        // Nothing is drained while many trajectories are published
        assert!(wait_for(|| cl.iterations() >= 10));

        model.remove_final_point(&target)?;
        assert!(wait_for(|| matches!(
            model.input_validity(),
            Ok(InputValidity::NoTarget)
        )));

        cl.request_stop();
        assert!(wait_for(|| !cl.is_running()));

        assert_eq!(
            cl.signals()?,
            vec![
                ComputeSignal::InputChanged(InputValidity::NoTarget),
                ComputeSignal::TrajUpdated {
                    iteration: cl.iterations(),
                    feasibility: Feasibility::Feasible,
                },
            ]
        );
        assert!(cl.signals()?.is_empty());

        cl.stop()?;
        Ok(())
    }

    #[test]
    fn test_invalid_periods_rejected() -> Result<(), ModelError> {
        let mut params = fast_params();
        params.idle_period_s = f64::INFINITY;

        let result = ComputeLoop::start(
            solvable_model()?,
            Box::new(DirectSolver::new()),
            params,
            Archiver::default(),
        );
        assert!(matches!(result, Err(ComputeError::InvalidParams(_))));

        Ok(())
    }

    #[test]
    fn test_stage_unstage_while_running() -> Result<(), Box<dyn std::error::Error>> {
        let model = solvable_model()?;
        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(DirectSolver::new()),
            fast_params(),
            Archiver::default(),
        )?;

        assert!(wait_for(|| cl.iterations() >= 1));

        for _ in 0..200 {
            assert!(model.stage_traj()?);
            assert!(model.is_traj_staged()?);
            assert!(!model.staged_path()?.is_empty());

            model.unstage_traj()?;
            assert!(model.staged_path()?.is_empty());
            assert!(!model.is_traj_staged()?);
        }

        cl.stop()?;
        Ok(())
    }

    #[test]
    fn test_stop_waits_for_at_most_one_solve() -> Result<(), Box<dyn std::error::Error>> {
        let model = solvable_model()?;
        let cl = ComputeLoop::start(
            model.clone(),
            Box::new(DirectSolver::new()),
            fast_params(),
            Archiver::default(),
        )?;

        assert!(wait_for(|| cl.iterations() >= 1));
        cl.request_stop();
        let at_request = cl.iterations();
        assert!(wait_for(|| !cl.is_running()));
        assert!(cl.iterations() <= at_request + 1);
        assert_eq!(cl.phase(), ComputePhase::Idle);

        cl.stop()?;
        Ok(())
    }
}
