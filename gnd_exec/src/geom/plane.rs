//! Plane (half-plane barrier) constraints.

use nalgebra::Vector2;
use serde::Serialize;

/// An infinite half-plane boundary through two points.
///
/// The free side is left of `p1 -> p2` in the optimizer frame, or left of `p2 -> p1` when
/// `direction` is set.
#[derive(Debug, Clone, Serialize)]
pub struct PlaneConstraint {
    pub p1_px: Vector2<f64>,
    pub p2_px: Vector2<f64>,
    pub direction: bool,
}

impl PlaneConstraint {
    pub fn new(p1_px: Vector2<f64>, p2_px: Vector2<f64>) -> Self {
        Self {
            p1_px,
            p2_px,
            direction: false,
        }
    }

    /// The directed segment used to build the constraint, honouring the direction flag.
    pub fn directed_px(&self) -> (Vector2<f64>, Vector2<f64>) {
        if self.direction {
            (self.p2_px, self.p1_px)
        } else {
            (self.p1_px, self.p2_px)
        }
    }
}
