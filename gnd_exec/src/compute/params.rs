//! Parameters for the compute loop

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::params::{check_non_negative, ParamsError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ComputeParams {
    /// Largest distance between the last node and the target for a feasible trajectory
    ///
    /// Units: meters
    pub feasibility_tol_m: f64,

    /// Shortest time between the start of two solves
    ///
    /// Units: seconds
    pub min_period_s: f64,

    /// Time to wait before checking the model again when it cannot be solved
    ///
    /// Units: seconds
    pub idle_period_s: f64,

    /// Archive a record of every solve in the session
    pub archive: bool,
}

impl Default for ComputeParams {
    fn default() -> Self {
        Self {
            feasibility_tol_m: 0.1,
            min_period_s: 0.05,
            idle_period_s: 0.1,
            archive: true,
        }
    }
}

impl ComputeParams {
    /// Check the periods can be turned into sleep durations.
    pub fn validate(&self) -> Result<(), ParamsError> {
        check_non_negative("min_period_s", self.min_period_s)?;
        check_non_negative("idle_period_s", self.idle_period_s)
    }
}
