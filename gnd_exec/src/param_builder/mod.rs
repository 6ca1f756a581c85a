//! # Parameter Builder
//!
//! Pure transforms from a [`ModelSnapshot`] into the solver's [`SolverParams`]. Nothing here
//! touches the model, so building is re-entrant and needs no locks.
//!
//! Capacity overflow is not an error: obstacles, half-spaces and waypoints which do not fit in
//! the solver's fixed arrays are dropped, and the number dropped is reported in the
//! [`BuildReport`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use crate::{
    geom::px_to_m,
    model::{InputValidity, ModelSnapshot},
    solver::{SolverParams, MAX_WAYPOINTS},
};

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod linear;
mod quadratic;
mod waypoints;

pub use linear::{halfspace, plane_row, polygon_rows, HalfSpace};
pub use quadratic::ellipse_matrix;
pub use waypoints::distribute_waypoints;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// How much of the snapshot made it into the parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub n_obs: usize,
    pub n_obs_dropped: usize,
    pub n_halfspaces: usize,
    pub n_halfspaces_dropped: usize,
    pub n_waypoints: usize,
    pub n_waypoints_dropped: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("There is no drone to plan a trajectory for")]
    NoDrone,

    #[error("There is no target to plan a trajectory to")]
    NoTarget,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BuildReport {
    /// Total number of entries dropped for lack of capacity.
    pub fn num_dropped(&self) -> usize {
        self.n_obs_dropped + self.n_halfspaces_dropped + self.n_waypoints_dropped
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the solver parameters for a snapshot.
pub fn build(snapshot: &ModelSnapshot) -> Result<(SolverParams, BuildReport), BuildError> {
    let drone = snapshot.drone.as_ref().ok_or(BuildError::NoDrone)?;
    let target = snapshot.target.as_ref().ok_or(BuildError::NoTarget)?;

    let mut params = SolverParams {
        horizon: snapshot.horizon,
        final_time_s: snapshot.final_time_s,
        free_final_time: snapshot.free_final_time,
        limits: snapshot.limits,
        start_pos_m: px_to_m(drone.position_px()),
        start_vel_ms: drone.velocity_ms(),
        start_accel_mss: drone.accel_mss(),
        target_pos_m: px_to_m(target.position_px()),
        target_vel_ms: Vector2::zeros(),
        target_accel_mss: Vector2::zeros(),
        ..Default::default()
    };

    let mut report = BuildReport::default();

    report.n_obs_dropped = quadratic::write_obstacles(snapshot, &mut params);
    report.n_obs = params.n_obs;

    report.n_halfspaces_dropped = linear::write_halfspaces(snapshot, &mut params);
    report.n_halfspaces = params.n_halfspaces;

    // Waypoints may use any node but the first and last, which are fixed by the boundary
    // conditions
    let last_free_node = snapshot.horizon.saturating_sub(2);
    let requested = snapshot.waypoints.len();
    let indices = distribute_waypoints(requested.min(MAX_WAYPOINTS), 1, last_free_node);

    for (i, (idx, wp)) in indices.iter().zip(snapshot.waypoints.iter()).enumerate() {
        params.wp_idx[i] = *idx;
        params.wp_pos_m[i] = px_to_m(wp.position_px());
    }
    params.n_waypoints = indices.len();
    report.n_waypoints = indices.len();
    report.n_waypoints_dropped = requested - indices.len();

    Ok((params, report))
}

/// Check whether the snapshot describes a problem worth solving.
pub fn validate(snapshot: &ModelSnapshot) -> InputValidity {
    let drone = match snapshot.drone {
        Some(ref d) => d,
        None => return InputValidity::NoDrone,
    };
    let target = match snapshot.target {
        Some(ref t) => t,
        None => return InputValidity::NoTarget,
    };

    if snapshot.in_obstacle(drone.position_px()) {
        InputValidity::DroneInObstacle
    } else if snapshot.in_obstacle(target.position_px()) {
        InputValidity::TargetInObstacle
    } else {
        InputValidity::Valid
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{
        geom::{
            CylinderConstraint, DroneEntity, EllipseConstraint, PlaneConstraint, PointEntity,
            PolygonConstraint,
        },
        model::{ConstraintModel, ModelError},
        solver::{MAX_HALFSPACES, MAX_OBS},
    };

    fn model_with_ends() -> Result<ConstraintModel, ModelError> {
        let model = ConstraintModel::default();
        model.add_drone(DroneEntity::new(Vector2::new(0.0, 0.0)))?;
        model.add_final_point(PointEntity::new(Vector2::new(1000.0, 0.0)))?;
        Ok(model)
    }

    #[test]
    fn test_obstacle_cap() -> Result<(), Box<dyn std::error::Error>> {
        let model = model_with_ends()?;
        for i in 0..(MAX_OBS + 1) {
            let x = 200.0 * (i as f64);
            model.add_ellipse(EllipseConstraint::new(Vector2::new(x, 500.0), 20.0, 20.0))?;
        }

        let (params, report) = build(&model.snapshot()?)?;

        assert_eq!(params.n_obs, MAX_OBS);
        assert_eq!(report.n_obs_dropped, 1);
        assert_eq!(model.ellipses()?.len(), MAX_OBS + 1);

        Ok(())
    }

    #[test]
    fn test_ellipses_before_cylinders() -> Result<(), Box<dyn std::error::Error>> {
        let model = model_with_ends()?;
        model.add_cylinder(CylinderConstraint::new(Vector2::new(0.0, 300.0), 50.0, 150.0))?;
        model.add_ellipse(EllipseConstraint::new(Vector2::new(300.0, 300.0), 50.0, 50.0))?;

        let (params, _) = build(&model.snapshot()?)?;

        assert_eq!(params.n_obs, 2);
        assert!((params.obs_centre_m[0] - Vector2::new(3.0, -3.0)).norm() < 1e-12);
        assert!(params.obs_trigger_m[0].is_infinite());
        assert!((params.obs_centre_m[1] - Vector2::new(0.0, -3.0)).norm() < 1e-12);
        assert!((params.obs_trigger_m[1] - 1.5).abs() < 1e-12);

        Ok(())
    }

    #[test]
    fn test_halfspace_cap_drops_whole_polygons() -> Result<(), Box<dyn std::error::Error>> {
        let model = model_with_ends()?;

        // 7 squares of 4 rows fill 28 rows, a pentagon then cannot fit but a plane still can
        for i in 0..7 {
            let x = 100.0 * (i as f64);
            model.add_polygon(PolygonConstraint::new(vec![
                Vector2::new(x, 0.0),
                Vector2::new(x + 50.0, 0.0),
                Vector2::new(x + 50.0, 50.0),
                Vector2::new(x, 50.0),
            ])?)?;
        }
        model.add_polygon(PolygonConstraint::new(vec![
            Vector2::new(0.0, 200.0),
            Vector2::new(100.0, 200.0),
            Vector2::new(130.0, 280.0),
            Vector2::new(50.0, 330.0),
            Vector2::new(-30.0, 280.0),
        ])?)?;
        model.add_plane(PlaneConstraint::new(Vector2::new(0.0, 0.0), Vector2::new(0.0, 10.0)))?;

        let (params, report) = build(&model.snapshot()?)?;

        assert_eq!(params.n_halfspaces, 29);
        assert!(params.n_halfspaces <= MAX_HALFSPACES);
        assert_eq!(report.n_halfspaces_dropped, 5);

        Ok(())
    }

    #[test]
    fn test_waypoints_and_boundary_conditions() -> Result<(), Box<dyn std::error::Error>> {
        let model = model_with_ends()?;
        for i in 0..3 {
            model.add_waypoint(PointEntity::new(Vector2::new(250.0 * (i + 1) as f64, 100.0)))?;
        }

        let (params, report) = build(&model.snapshot()?)?;

        // Default horizon of 20 nodes, waypoints over [1, 18]
        assert_eq!(params.horizon, 20);
        assert_eq!(&params.wp_idx[..params.n_waypoints], &[5, 10, 15]);
        assert!((params.wp_pos_m[0] - Vector2::new(2.5, -1.0)).norm() < 1e-12);
        assert_eq!(report.n_waypoints_dropped, 0);

        assert!((params.target_pos_m - Vector2::new(10.0, 0.0)).norm() < 1e-12);
        assert_eq!(params.target_vel_ms, Vector2::zeros());

        Ok(())
    }

    #[test]
    fn test_validate() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        assert_eq!(validate(&model.snapshot()?), InputValidity::NoDrone);

        model.add_drone(DroneEntity::new(Vector2::new(0.0, 0.0)))?;
        assert_eq!(validate(&model.snapshot()?), InputValidity::NoTarget);

        let target = model.add_final_point(PointEntity::new(Vector2::new(500.0, 0.0)))?;
        assert_eq!(validate(&model.snapshot()?), InputValidity::Valid);

        let e = model.add_ellipse(EllipseConstraint::new(Vector2::new(500.0, 0.0), 50.0, 50.0))?;
        assert_eq!(validate(&model.snapshot()?), InputValidity::TargetInObstacle);

        e.write()?.set_position_px(Vector2::new(10.0, 0.0));
        assert_eq!(validate(&model.snapshot()?), InputValidity::DroneInObstacle);

        model.remove_final_point(&target)?;
        assert_eq!(validate(&model.snapshot()?), InputValidity::NoTarget);
        assert!(matches!(build(&model.snapshot()?), Err(BuildError::NoTarget)));

        Ok(())
    }
}
