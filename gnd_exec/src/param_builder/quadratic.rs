//! Quadratic (ellipse and cylinder) obstacle constraints.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Matrix2;

use crate::{
    geom::{px_to_m, screen_deg_to_rad, EllipseConstraint},
    model::ModelSnapshot,
    solver::{SolverParams, MAX_OBS},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Smallest semi-axis used to build a shape matrix, keeping zero sized ellipses finite.
const MIN_SEMI_AXIS_M: f64 = 1e-3;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Shape matrix of an ellipse with semi-axes `a_m` and `b_m` rotated by `theta_rad`.
///
/// A point `d` from the centre lies on the ellipse when `d^T M d = 1`.
pub fn ellipse_matrix(a_m: f64, b_m: f64, theta_rad: f64) -> Matrix2<f64> {
    let inv_a2 = 1.0 / a_m.max(MIN_SEMI_AXIS_M).powi(2);
    let inv_b2 = 1.0 / b_m.max(MIN_SEMI_AXIS_M).powi(2);
    let (s, c) = theta_rad.sin_cos();

    let m00 = inv_a2 * c * c + inv_b2 * s * s;
    let m01 = (inv_a2 - inv_b2) * s * c;
    let m11 = inv_a2 * s * s + inv_b2 * c * c;

    Matrix2::new(m00, m01, m01, m11)
}

/// Write every ellipse, then every cylinder, into the obstacle arrays.
///
/// Returns the number of obstacles which did not fit.
pub(super) fn write_obstacles(snapshot: &ModelSnapshot, params: &mut SolverParams) -> usize {
    let obstacles = snapshot
        .ellipses()
        .map(|e| (e, f64::INFINITY))
        .chain(snapshot.cylinders().map(|c| (c.body(), c.trigger_radius_m())));

    let mut dropped = 0;
    params.n_obs = 0;

    for (ellipse, trigger_m) in obstacles {
        if params.n_obs >= MAX_OBS {
            dropped += 1;
            continue;
        }

        let i = params.n_obs;
        params.obs_centre_m[i] = px_to_m(ellipse.position_px());
        params.obs_matrix[i] = matrix_for(ellipse);
        params.obs_trigger_m[i] = trigger_m;
        params.n_obs += 1;
    }

    dropped
}

fn matrix_for(ellipse: &EllipseConstraint) -> Matrix2<f64> {
    let (a_m, b_m) = ellipse.semi_axes_m();
    ellipse_matrix(a_m, b_m, screen_deg_to_rad(ellipse.rotation_deg()))
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;
    use std::f64::consts::FRAC_PI_2;

    use crate::geom::GRID_SCALE_PX_PER_M;

    #[test]
    fn test_circle_is_scaled_identity() {
        let r_px = 80.0;
        let e = EllipseConstraint::new(Vector2::new(300.0, 200.0), r_px, r_px);
        let a = r_px / GRID_SCALE_PX_PER_M;

        let m = matrix_for(&e);
        assert!((m - Matrix2::identity() / (a * a)).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_swaps_axes() {
        let m = ellipse_matrix(2.0, 1.0, FRAC_PI_2);

        assert!((m[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((m[(1, 1)] - 0.25).abs() < 1e-12);
        assert!(m[(0, 1)].abs() < 1e-12);
        assert_eq!(m[(0, 1)], m[(1, 0)]);
    }

    #[test]
    fn test_boundary_points_on_ellipse() {
        // Screen rotation of 30 deg clockwise with 0.2 m clearance
        let mut e = EllipseConstraint::new(Vector2::new(100.0, -50.0), 120.0, 60.0);
        e.set_rotation_deg(30.0);
        e.set_clearance_m(0.2);

        let m = matrix_for(&e);
        let c = px_to_m(e.position_px());

        for p in e.region().points_px() {
            let d = px_to_m(*p) - c;
            let q = (d.transpose() * m * d)[(0, 0)];
            assert!((q - 1.0).abs() < 1e-9, "d^T M d = {}", q);
        }
    }
}
