//! # Data Store
//!
//! Everything the exec thread owns between cycles.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{path::PathBuf, sync::Arc};

use log::{debug, info, warn};

use crate::{
    compute::ComputeSignal,
    model::{ConstraintModel, Feasibility, InputValidity},
    traj_mgr::{SessionSink, TrajMgr, TrajMgrParams},
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Session elapsed time at the start of this cycle
    pub sim_time_s: f64,

    /// Directory relative paths given in telecommands are resolved against
    pub session_root: PathBuf,

    // Model and trajectory lifecycle
    pub model: Arc<ConstraintModel>,

    pub traj_mgr: TrajMgr,

    /// Where executed trajectories are sent
    pub sink: SessionSink,

    // Compute loop status
    /// Iteration of the last trajectory published
    pub last_traj_iteration: u64,

    pub feasibility: Feasibility,

    pub input_validity: InputValidity,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DataStore {
    pub fn new(
        model: Arc<ConstraintModel>,
        traj_mgr_params: TrajMgrParams,
        session_root: PathBuf,
    ) -> Self {
        Self {
            num_cycles: 0,
            sim_time_s: 0.0,
            session_root,
            traj_mgr: TrajMgr::new(model.clone(), traj_mgr_params),
            model,
            sink: SessionSink::new(),
            last_traj_iteration: 0,
            feasibility: Feasibility::Unknown,
            input_validity: InputValidity::NoDrone,
            num_consec_cycle_overruns: 0,
        }
    }

    /// Perform actions required at the start of a cycle.
    pub fn cycle_start(&mut self, sim_time_s: f64) {
        self.num_cycles += 1;
        self.sim_time_s = sim_time_s;
    }

    /// Take in the signals sent by the compute loop since the last cycle.
    ///
    /// Only the latest state matters, so a burst of signals is collapsed into the newest values.
    pub fn handle_signals(&mut self, signals: Vec<ComputeSignal>) {
        for signal in signals {
            match signal {
                ComputeSignal::TrajUpdated {
                    iteration,
                    feasibility,
                } => {
                    self.last_traj_iteration = iteration;
                    self.feasibility = feasibility;
                }
                ComputeSignal::InputChanged(validity) => {
                    if validity == InputValidity::Valid {
                        info!("Layout is solvable");
                    } else {
                        warn!("Layout cannot be solved: {:?}", validity);
                    }
                    self.input_validity = validity;
                }
            }
        }

        debug!(
            "Cycle {}: trajectory {} is {:?}",
            self.num_cycles, self.last_traj_iteration, self.feasibility
        );
    }

    /// Resolve a path from a telecommand against the session root.
    pub fn session_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.session_root.join(path)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signals_collapse() {
        let mut ds = DataStore::new(
            Arc::new(ConstraintModel::default()),
            TrajMgrParams::default(),
            PathBuf::from("/tmp/session"),
        );

        ds.handle_signals(vec![
            ComputeSignal::InputChanged(InputValidity::Valid),
            ComputeSignal::TrajUpdated {
                iteration: 3,
                feasibility: Feasibility::Infeasible,
            },
            ComputeSignal::TrajUpdated {
                iteration: 4,
                feasibility: Feasibility::Feasible,
            },
        ]);

        assert_eq!(ds.last_traj_iteration, 4);
        assert_eq!(ds.feasibility, Feasibility::Feasible);
        assert_eq!(ds.input_validity, InputValidity::Valid);

        assert_eq!(
            ds.session_path(std::path::Path::new("layouts/a.layout")),
            PathBuf::from("/tmp/session/layouts/a.layout")
        );
    }
}
