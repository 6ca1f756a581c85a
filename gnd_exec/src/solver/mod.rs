//! # Solver interface
//!
//! The trajectory optimizer is treated as an opaque solver: it is given a fixed size
//! [`SolverParams`] by value and returns a [`SolverOutput`]. All quantities are in the optimizer
//! frame (meters, y up).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Matrix2, Vector2};
use serde::Serialize;

use crate::model::{Trajectory, VehicleLimits};

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod direct;

pub use direct::DirectSolver;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of ellipse and cylinder obstacles the solver accepts.
pub const MAX_OBS: usize = 8;

/// Maximum number of linear inequality rows the solver accepts.
pub const MAX_HALFSPACES: usize = 32;

/// Maximum number of waypoints the solver accepts.
pub const MAX_WAYPOINTS: usize = 8;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A trajectory optimizer.
pub trait Solver: Send {
    fn solve(&mut self, params: SolverParams) -> SolverOutput;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Input to the solver, built fresh for every solve.
#[derive(Debug, Clone, Serialize)]
pub struct SolverParams {
    // ---- PROBLEM ----
    /// Number of trajectory nodes, K
    pub horizon: usize,

    /// Trajectory duration, or the initial guess of it with a free final time
    pub final_time_s: f64,

    pub free_final_time: bool,

    pub limits: VehicleLimits,

    // ---- BOUNDARY CONDITIONS ----
    pub start_pos_m: Vector2<f64>,
    pub start_vel_ms: Vector2<f64>,
    pub start_accel_mss: Vector2<f64>,

    pub target_pos_m: Vector2<f64>,
    pub target_vel_ms: Vector2<f64>,
    pub target_accel_mss: Vector2<f64>,

    // ---- QUADRATIC CONSTRAINTS ----
    /// Number of entries of the obstacle arrays in use
    pub n_obs: usize,

    pub obs_centre_m: [Vector2<f64>; MAX_OBS],

    /// Shape matrix, a point `x` is outside the obstacle when `(x - c)^T M (x - c) >= 1`
    pub obs_matrix: [Matrix2<f64>; MAX_OBS],

    /// Radius within which the obstacle is active, infinite for ellipses
    pub obs_trigger_m: [f64; MAX_OBS],

    // ---- LINEAR CONSTRAINTS ----
    /// Number of rows of the half-space arrays in use
    pub n_halfspaces: usize,

    /// Row `i` is satisfied when `hs_a[i] . x <= hs_b[i]`
    pub hs_a: [Vector2<f64>; MAX_HALFSPACES],
    pub hs_b: [f64; MAX_HALFSPACES],

    // ---- WAYPOINTS ----
    pub n_waypoints: usize,

    /// Node index each waypoint must be reached at
    pub wp_idx: [usize; MAX_WAYPOINTS],
    pub wp_pos_m: [Vector2<f64>; MAX_WAYPOINTS],
}

/// Output from the solver.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverOutput {
    pub positions_m: Vec<Vector2<f64>>,
    pub velocities_ms: Vec<Vector2<f64>>,
    pub accels_mss: Vec<Vector2<f64>>,

    /// Time between nodes, which differs from `tf / (K - 1)` only with a free final time
    pub dt_s: f64,

    /// Distance between the last node and the target
    pub residual_m: f64,

    /// Number of iterations the solver took
    pub iterations: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            horizon: 0,
            final_time_s: 0.0,
            free_final_time: false,
            limits: VehicleLimits::default(),
            start_pos_m: Vector2::zeros(),
            start_vel_ms: Vector2::zeros(),
            start_accel_mss: Vector2::zeros(),
            target_pos_m: Vector2::zeros(),
            target_vel_ms: Vector2::zeros(),
            target_accel_mss: Vector2::zeros(),
            n_obs: 0,
            obs_centre_m: [Vector2::zeros(); MAX_OBS],
            obs_matrix: [Matrix2::zeros(); MAX_OBS],
            obs_trigger_m: [0.0; MAX_OBS],
            n_halfspaces: 0,
            hs_a: [Vector2::zeros(); MAX_HALFSPACES],
            hs_b: [0.0; MAX_HALFSPACES],
            n_waypoints: 0,
            wp_idx: [0; MAX_WAYPOINTS],
            wp_pos_m: [Vector2::zeros(); MAX_WAYPOINTS],
        }
    }
}

impl SolverParams {
    /// Time between nodes for the requested final time.
    pub fn dt_s(&self) -> f64 {
        if self.horizon > 1 {
            self.final_time_s / ((self.horizon - 1) as f64)
        } else {
            self.final_time_s
        }
    }
}

impl From<SolverOutput> for Trajectory {
    fn from(out: SolverOutput) -> Self {
        Self {
            positions_m: out.positions_m,
            velocities_ms: out.velocities_ms,
            accels_mss: out.accels_mss,
            dt_s: out.dt_s,
        }
    }
}
