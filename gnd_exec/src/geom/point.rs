//! Point-like entities: waypoints, final points and drones.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use comms_if::eqpt::drone::{sanitise_port, DroneEndpoint};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single position, used for waypoints and final points.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PointEntity {
    position_px: Vector2<f64>,

    /// Telemetry port the point follows, 0 when fixed
    port: u16,
}

/// The state of a drone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DroneEntity {
    position_px: Vector2<f64>,

    /// Velocity in the optimizer frame
    ///
    /// Units: meters/second
    velocity_ms: Vector2<f64>,

    /// Acceleration in the optimizer frame
    ///
    /// Units: meters/second^2
    accel_mss: Vector2<f64>,

    /// Where trajectory commands for this drone are sent
    endpoint: DroneEndpoint,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PointEntity {
    pub fn new(position_px: Vector2<f64>) -> Self {
        Self {
            position_px,
            port: 0,
        }
    }

    pub fn position_px(&self) -> Vector2<f64> {
        self.position_px
    }

    pub fn set_position_px(&mut self, position_px: Vector2<f64>) {
        self.position_px = position_px;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: i64) {
        self.port = sanitise_port(port);
    }
}

impl DroneEntity {
    pub fn new(position_px: Vector2<f64>) -> Self {
        Self {
            position_px,
            ..Default::default()
        }
    }

    pub fn position_px(&self) -> Vector2<f64> {
        self.position_px
    }

    pub fn set_position_px(&mut self, position_px: Vector2<f64>) {
        self.position_px = position_px;
    }

    pub fn velocity_ms(&self) -> Vector2<f64> {
        self.velocity_ms
    }

    pub fn set_velocity_ms(&mut self, velocity_ms: Vector2<f64>) {
        self.velocity_ms = velocity_ms;
    }

    pub fn accel_mss(&self) -> Vector2<f64> {
        self.accel_mss
    }

    pub fn set_accel_mss(&mut self, accel_mss: Vector2<f64>) {
        self.accel_mss = accel_mss;
    }

    pub fn endpoint(&self) -> DroneEndpoint {
        self.endpoint
    }

    /// Set the endpoint, an invalid address or port is reset to its safe default.
    pub fn set_endpoint(&mut self, ip: &str, port: i64) {
        self.endpoint = DroneEndpoint::new(ip, port);
    }

    /// The drone's telemetry port, which is the same port its commands are sent to.
    pub fn port(&self) -> u16 {
        self.endpoint.port
    }
}
