//! # Ground Executable Parameters
//!
//! This module provides parameters for the ground station executable, loaded from
//! `params/gnd_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{compute::ComputeParams, model::ModelParams, traj_mgr::TrajMgrParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    /// Target period of one cycle of the exec thread
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Initial solver settings of the model
    pub model: ModelParams,

    pub compute: ComputeParams,

    pub traj_mgr: TrajMgrParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("{name} must be a positive number of seconds, found {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must be a finite number of seconds no less than zero, found {value}")]
    Negative { name: &'static str, value: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecParams {
    /// Check the values a parameter file can get wrong without failing to parse.
    pub fn validate(&self) -> Result<(), ParamsError> {
        check_positive("cycle_period_s", self.cycle_period_s)?;
        self.compute.validate()
    }
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            model: ModelParams::default(),
            compute: ComputeParams::default(),
            traj_mgr: TrajMgrParams::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check a period which must be finite and strictly positive.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    match value.is_finite() && value > 0.0 {
        true => Ok(()),
        false => Err(ParamsError::NotPositive { name, value }),
    }
}

/// Check a period which may be zero but must be finite.
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<(), ParamsError> {
    match value.is_finite() && value >= 0.0 {
        true => Ok(()),
        false => Err(ParamsError::Negative { name, value }),
    }
}
