//! Direct solver, straight segments through the waypoints.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

use super::{Solver, SolverOutput, SolverParams};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Smallest time step chosen with a free final time, so a zero length trajectory still has a
/// usable time base.
const MIN_DT_S: f64 = 0.01;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A stand-in solver which ignores the obstacles and interpolates straight segments from the
/// start, through each waypoint at its assigned node, to the target.
///
/// With a free final time the time step is stretched so the fastest segment is flown at the
/// vehicle's velocity limit.
#[derive(Debug, Default)]
pub struct DirectSolver {
    num_solves: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DirectSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the solver has been called.
    pub fn num_solves(&self) -> usize {
        self.num_solves
    }
}

impl Solver for DirectSolver {
    fn solve(&mut self, params: SolverParams) -> SolverOutput {
        self.num_solves += 1;

        let k = params.horizon.max(2);
        let last = k - 1;

        // Knots are (node index, position), with strictly increasing indices
        let mut knots: Vec<(usize, Vector2<f64>)> = vec![(0, params.start_pos_m)];
        for i in 0..params.n_waypoints {
            let idx = params.wp_idx[i];
            if idx > knots[knots.len() - 1].0 && idx < last {
                knots.push((idx, params.wp_pos_m[i]));
            }
        }
        knots.push((last, params.target_pos_m));

        let mut positions_m = Vec::with_capacity(k);
        for pair in knots.windows(2) {
            let (i0, p0) = pair[0];
            let (i1, p1) = pair[1];
            let span = (i1 - i0) as f64;

            for j in i0..i1 {
                let t = (j - i0) as f64 / span;
                positions_m.push(p0 + (p1 - p0) * t);
            }
        }
        positions_m.push(params.target_pos_m);

        let dt_s = if params.free_final_time && params.limits.max_vel_ms > 0.0 {
            let longest = positions_m
                .windows(2)
                .map(|w| (w[1] - w[0]).norm())
                .fold(0.0, f64::max);
            (longest / params.limits.max_vel_ms).max(MIN_DT_S)
        } else {
            params.dt_s().max(MIN_DT_S)
        };

        let velocities_ms = differentiate(&positions_m, params.target_vel_ms, dt_s);
        let accels_mss = differentiate(&velocities_ms, params.target_accel_mss, dt_s);

        let residual_m = positions_m
            .last()
            .map(|p| (p - params.target_pos_m).norm())
            .unwrap_or(f64::INFINITY);

        SolverOutput {
            positions_m,
            velocities_ms,
            accels_mss,
            dt_s,
            residual_m,
            iterations: 1,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Forward difference of a sequence, using `terminal` for the last element.
fn differentiate(values: &[Vector2<f64>], terminal: Vector2<f64>, dt_s: f64) -> Vec<Vector2<f64>> {
    let mut out: Vec<Vector2<f64>> = values.windows(2).map(|w| (w[1] - w[0]) / dt_s).collect();
    out.push(terminal);
    out
}
