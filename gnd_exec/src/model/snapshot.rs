//! Plain copies of the model's contents.

use nalgebra::Vector2;

use crate::geom::{Constraint, CylinderConstraint, DroneEntity, EllipseConstraint, PointEntity};

use super::VehicleLimits;

/// Everything the parameter builder reads from the model, copied so no locks are needed.
///
/// Constraints are ordered ellipses, then cylinders, then polygons, then planes.
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub constraints: Vec<Constraint>,

    /// Waypoints in visiting order
    pub waypoints: Vec<PointEntity>,

    /// The first final point
    pub target: Option<PointEntity>,

    /// The first drone
    pub drone: Option<DroneEntity>,

    pub horizon: usize,
    pub final_time_s: f64,
    pub free_final_time: bool,
    pub limits: VehicleLimits,
    pub clearance_m: f64,
}

impl ModelSnapshot {
    pub fn ellipses(&self) -> impl Iterator<Item = &EllipseConstraint> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Ellipse(e) => Some(e),
            _ => None,
        })
    }

    pub fn cylinders(&self) -> impl Iterator<Item = &CylinderConstraint> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Cylinder(c) => Some(c),
            _ => None,
        })
    }

    /// Returns true if the point lies inside any ellipse or cylinder, including clearance.
    pub fn in_obstacle(&self, point_px: Vector2<f64>) -> bool {
        self.constraints
            .iter()
            .filter_map(|c| c.keep_out_region())
            .any(|r| r.contains(point_px))
    }
}
