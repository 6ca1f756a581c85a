//! Ellipse and cylinder keep-out constraints.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use comms_if::eqpt::drone::sanitise_port;

use super::{non_negative, Region, DEFAULT_SIZE_PX, GRID_SCALE_PX_PER_M};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An elliptical obstacle.
///
/// The cached [`Region`] always reflects the current position, size, rotation and clearance, as
/// every setter of those fields regenerates it.
#[derive(Debug, Clone, Serialize)]
pub struct EllipseConstraint {
    position_px: Vector2<f64>,

    /// Semi-axis along the ellipse's local x axis
    width_px: f64,

    /// Semi-axis along the ellipse's local y axis
    height_px: f64,

    /// Screen rotation, clockwise positive
    rotation_deg: f64,

    /// Margin added to both semi-axes
    ///
    /// Units: meters
    clearance_m: f64,

    /// Keep-in rather than keep-out. Retained for layouts but not supported by the solver.
    direction: bool,

    /// Set when the region overlaps another ellipse or cylinder
    overlap: bool,

    /// Telemetry port the ellipse follows, 0 when fixed
    port: u16,

    #[serde(skip)]
    region: Region,
}

/// A cylindrical hoop, an ellipse which only constrains the vehicle once it is inside the
/// trigger radius.
#[derive(Debug, Clone, Serialize)]
pub struct CylinderConstraint {
    body: EllipseConstraint,

    /// Outer activation radius, never smaller than the width
    trigger_width_px: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EllipseConstraint {
    pub fn new(position_px: Vector2<f64>, width_px: f64, height_px: f64) -> Self {
        let mut e = Self {
            position_px,
            width_px: non_negative(width_px),
            height_px: non_negative(height_px),
            rotation_deg: 0.0,
            clearance_m: 0.0,
            direction: false,
            overlap: false,
            port: 0,
            region: Region::default(),
        };
        e.update_region();
        e
    }

    pub fn position_px(&self) -> Vector2<f64> {
        self.position_px
    }

    pub fn set_position_px(&mut self, position_px: Vector2<f64>) {
        self.position_px = position_px;
        self.update_region();
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn set_width_px(&mut self, width_px: f64) {
        self.width_px = non_negative(width_px);
        self.update_region();
    }

    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    pub fn set_height_px(&mut self, height_px: f64) {
        self.height_px = non_negative(height_px);
        self.update_region();
    }

    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    pub fn set_rotation_deg(&mut self, rotation_deg: f64) {
        self.rotation_deg = if rotation_deg.is_finite() {
            util::maths::wrap_deg(rotation_deg)
        } else {
            0.0
        };
        self.update_region();
    }

    pub fn clearance_m(&self) -> f64 {
        self.clearance_m
    }

    pub fn set_clearance_m(&mut self, clearance_m: f64) {
        self.clearance_m = non_negative(clearance_m);
        self.update_region();
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    pub fn set_direction(&mut self, direction: bool) {
        self.direction = direction;
    }

    pub fn overlap(&self) -> bool {
        self.overlap
    }

    pub fn set_overlap(&mut self, overlap: bool) {
        self.overlap = overlap;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Set the telemetry port, a port outside the user range resets to 0.
    pub fn set_port(&mut self, port: i64) {
        self.port = sanitise_port(port);
    }

    /// Outline of the ellipse including its clearance.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Semi-axes in meters including the clearance margin.
    pub fn semi_axes_m(&self) -> (f64, f64) {
        (
            self.width_px / GRID_SCALE_PX_PER_M + self.clearance_m,
            self.height_px / GRID_SCALE_PX_PER_M + self.clearance_m,
        )
    }

    fn update_region(&mut self) {
        let (a_m, b_m) = self.semi_axes_m();
        self.region = Region::ellipse(
            self.position_px,
            a_m * GRID_SCALE_PX_PER_M,
            b_m * GRID_SCALE_PX_PER_M,
            self.rotation_deg,
        );
    }
}

impl Default for EllipseConstraint {
    fn default() -> Self {
        Self::new(Vector2::zeros(), DEFAULT_SIZE_PX, DEFAULT_SIZE_PX)
    }
}

impl CylinderConstraint {
    pub fn new(position_px: Vector2<f64>, width_px: f64, trigger_width_px: f64) -> Self {
        let body = EllipseConstraint::new(position_px, width_px, width_px);
        let trigger_width_px = non_negative(trigger_width_px).max(body.width_px());

        Self {
            body,
            trigger_width_px,
        }
    }

    /// The body of the cylinder as an ellipse.
    pub fn body(&self) -> &EllipseConstraint {
        &self.body
    }

    pub fn position_px(&self) -> Vector2<f64> {
        self.body.position_px()
    }

    pub fn set_position_px(&mut self, position_px: Vector2<f64>) {
        self.body.set_position_px(position_px)
    }

    pub fn width_px(&self) -> f64 {
        self.body.width_px()
    }

    /// Set the width, pushing the trigger width out if it would otherwise be smaller.
    pub fn set_width_px(&mut self, width_px: f64) {
        self.body.set_width_px(width_px);
        self.trigger_width_px = self.trigger_width_px.max(self.body.width_px());
    }

    pub fn height_px(&self) -> f64 {
        self.body.height_px()
    }

    pub fn set_height_px(&mut self, height_px: f64) {
        self.body.set_height_px(height_px)
    }

    pub fn rotation_deg(&self) -> f64 {
        self.body.rotation_deg()
    }

    pub fn set_rotation_deg(&mut self, rotation_deg: f64) {
        self.body.set_rotation_deg(rotation_deg)
    }

    pub fn clearance_m(&self) -> f64 {
        self.body.clearance_m()
    }

    pub fn set_clearance_m(&mut self, clearance_m: f64) {
        self.body.set_clearance_m(clearance_m)
    }

    pub fn overlap(&self) -> bool {
        self.body.overlap()
    }

    pub fn set_overlap(&mut self, overlap: bool) {
        self.body.set_overlap(overlap)
    }

    pub fn port(&self) -> u16 {
        self.body.port()
    }

    pub fn set_port(&mut self, port: i64) {
        self.body.set_port(port)
    }

    pub fn region(&self) -> &Region {
        self.body.region()
    }

    pub fn trigger_width_px(&self) -> f64 {
        self.trigger_width_px
    }

    /// Set the trigger width, clamped to be at least the width.
    pub fn set_trigger_width_px(&mut self, trigger_width_px: f64) {
        self.trigger_width_px = non_negative(trigger_width_px).max(self.body.width_px());
    }

    pub fn trigger_radius_m(&self) -> f64 {
        self.trigger_width_px / GRID_SCALE_PX_PER_M
    }
}

impl Default for CylinderConstraint {
    fn default() -> Self {
        Self::new(Vector2::zeros(), DEFAULT_SIZE_PX, 2.0 * DEFAULT_SIZE_PX)
    }
}
