//! # Geometry primitives
//!
//! The constraint entities the operator lays out, in screen pixel units, plus the frame helpers
//! which move between the screen and the optimizer's frame.
//!
//! ## Frames
//!
//! - Screen: pixels, x right and y down, rotations in degrees and clockwise positive.
//! - Optimizer: meters, x east and y north (y up on screen), rotations counter-clockwise positive.
//!
//! The two are related by [`GRID_SCALE_PX_PER_M`] and a y axis inversion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, RwLock};

use nalgebra::Vector2;

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod ellipse;
mod plane;
mod point;
mod polygon;
mod region;

pub use ellipse::{CylinderConstraint, EllipseConstraint};
pub use plane::PlaneConstraint;
pub use point::{DroneEntity, PointEntity};
pub use polygon::PolygonConstraint;
pub use region::Region;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of screen pixels per meter in the optimizer frame.
pub const GRID_SCALE_PX_PER_M: f64 = 100.0;

/// Number of points used to sample an ellipse's outline into a [`Region`].
pub const REGION_NUM_POINTS: usize = 32;

/// Size given to new ellipses and cylinders when none is specified.
pub const DEFAULT_SIZE_PX: f64 = 50.0;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

pub type EllipseHandle = Arc<RwLock<EllipseConstraint>>;
pub type CylinderHandle = Arc<RwLock<CylinderConstraint>>;
pub type PolygonHandle = Arc<RwLock<PolygonConstraint>>;
pub type PlaneHandle = Arc<RwLock<PlaneConstraint>>;
pub type PointHandle = Arc<RwLock<PointEntity>>;
pub type DroneHandle = Arc<RwLock<DroneEntity>>;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A copy of one constraint entity, as used by the parameter builder.
#[derive(Debug, Clone)]
pub enum Constraint {
    Ellipse(EllipseConstraint),
    Cylinder(CylinderConstraint),
    Polygon(PolygonConstraint),
    Plane(PlaneConstraint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Ellipse,
    Cylinder,
    Polygon,
    Plane,
}

#[derive(Debug, thiserror::Error)]
pub enum GeomError {
    #[error("A polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Ellipse(_) => ConstraintKind::Ellipse,
            Constraint::Cylinder(_) => ConstraintKind::Cylinder,
            Constraint::Polygon(_) => ConstraintKind::Polygon,
            Constraint::Plane(_) => ConstraintKind::Plane,
        }
    }

    /// The region the vehicle must not enter for this constraint, if it has one.
    pub fn keep_out_region(&self) -> Option<&Region> {
        match self {
            Constraint::Ellipse(e) => Some(e.region()),
            Constraint::Cylinder(c) => Some(c.region()),
            Constraint::Polygon(_) | Constraint::Plane(_) => None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a screen position into the optimizer frame.
pub fn px_to_m(px: Vector2<f64>) -> Vector2<f64> {
    Vector2::new(px.x / GRID_SCALE_PX_PER_M, -px.y / GRID_SCALE_PX_PER_M)
}

/// Convert an optimizer frame position into screen pixels.
pub fn m_to_px(m: Vector2<f64>) -> Vector2<f64> {
    Vector2::new(m.x * GRID_SCALE_PX_PER_M, -m.y * GRID_SCALE_PX_PER_M)
}

/// Convert a North-East-Down position into screen pixels, dropping the down component.
pub fn ned_to_px(ned: [f64; 3]) -> Vector2<f64> {
    let enu = comms_if::eqpt::drone::ned_to_enu(ned);
    m_to_px(Vector2::new(enu[0], enu[1]))
}

/// Convert a screen rotation into an optimizer frame angle.
pub fn screen_deg_to_rad(rotation_deg: f64) -> f64 {
    -rotation_deg.to_radians()
}

/// Clamp a size to be non-negative, mapping NaN to zero.
pub(crate) fn non_negative(value: f64) -> f64 {
    util::maths::clamp(value, 0.0, f64::INFINITY)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frames() {
        let px = Vector2::new(250.0, 100.0);
        let m = px_to_m(px);
        assert!((m - Vector2::new(2.5, -1.0)).norm() < 1e-12);
        assert!((m_to_px(m) - px).norm() < 1e-12);

        // 1 m north, 2 m east
        let ned_px = ned_to_px([1.0, 2.0, -5.0]);
        assert!((ned_px - Vector2::new(200.0, -100.0)).norm() < 1e-12);
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(-3.0), 0.0);
        assert_eq!(non_negative(f64::NAN), 0.0);
        assert_eq!(non_negative(4.0), 4.0);
    }
}
