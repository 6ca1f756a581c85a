//! # Telemetry ingestion
//!
//! Applies raw telemetry packets to the entity bound to the packet's port. Malformed packets are
//! dropped without error, a successful write is the caller's cue to refresh.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};
use nalgebra::Vector2;

use comms_if::eqpt::drone::{ned_to_enu, TelemPacket};

use crate::{
    geom::{ned_to_px, CylinderHandle, DroneHandle, EllipseHandle, PointHandle},
    model::{ConstraintModel, ModelError},
};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An entity which follows a telemetry stream.
#[derive(Debug, Clone)]
pub enum TelemTarget {
    Ellipse(EllipseHandle),
    Cylinder(CylinderHandle),
    Point(PointHandle),
    Drone(DroneHandle),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply a raw telemetry packet to the target, returning true if anything was written.
///
/// Only drones take the velocity and acceleration, other entities just move.
pub fn apply_telem(target: &TelemTarget, bytes: &[u8]) -> bool {
    let pkt = match TelemPacket::from_bytes(bytes) {
        Some(p) => p,
        None => {
            trace!("Dropping malformed telemetry packet of {} bytes", bytes.len());
            return false;
        }
    };

    let position_px = ned_to_px(pkt.position_m_ned);

    let written = match target {
        TelemTarget::Ellipse(e) => e.write().map(|mut e| e.set_position_px(position_px)).is_ok(),
        TelemTarget::Cylinder(c) => c.write().map(|mut c| c.set_position_px(position_px)).is_ok(),
        TelemTarget::Point(p) => p.write().map(|mut p| p.set_position_px(position_px)).is_ok(),
        TelemTarget::Drone(d) => d
            .write()
            .map(|mut d| {
                d.set_position_px(position_px);
                if let Some(v) = pkt.velocity_ms_ned {
                    d.set_velocity_ms(ned_to_planar(v));
                }
                if let Some(a) = pkt.accel_mss_ned {
                    d.set_accel_mss(ned_to_planar(a));
                }
            })
            .is_ok(),
    };

    if !written {
        warn!("Telemetry target lock is poisoned, dropping packet");
    }

    written
}

/// Route a packet received on `port` to every entity bound to that port.
///
/// Returns the number of entities updated.
pub fn route_telem(model: &ConstraintModel, port: u16, bytes: &[u8]) -> Result<usize, ModelError> {
    let num_updated = model
        .telem_bindings()?
        .iter()
        .filter(|(p, _)| *p == port)
        .filter(|(_, target)| apply_telem(target, bytes))
        .count();

    Ok(num_updated)
}

fn ned_to_planar(ned: [f64; 3]) -> Vector2<f64> {
    let enu = ned_to_enu(ned);
    Vector2::new(enu[0], enu[1])
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::geom::{DroneEntity, EllipseConstraint, GRID_SCALE_PX_PER_M};

    #[test]
    fn test_drone_telem() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let mut drone = DroneEntity::default();
        drone.set_endpoint("127.0.0.1", 5600);
        let d = model.add_drone(drone)?;

        let pkt = TelemPacket {
            position_m_ned: [1.0, 2.0, -3.0],
            velocity_ms_ned: Some([0.5, -0.5, 0.0]),
            accel_mss_ned: None,
        };

        assert_eq!(route_telem(&model, 5600, &pkt.to_bytes())?, 1);
        assert_eq!(route_telem(&model, 5601, &pkt.to_bytes())?, 0);

        let d = d.read()?;
        assert_eq!(
            d.position_px(),
            Vector2::new(2.0 * GRID_SCALE_PX_PER_M, -1.0 * GRID_SCALE_PX_PER_M)
        );
        assert_eq!(d.velocity_ms(), Vector2::new(-0.5, 0.5));
        assert_eq!(d.accel_mss(), Vector2::zeros());

        Ok(())
    }

    #[test]
    fn test_malformed_dropped() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let mut e = EllipseConstraint::new(Vector2::new(10.0, 10.0), 5.0, 5.0);
        e.set_port(6000);
        let h = model.add_ellipse(e)?;

        assert!(!apply_telem(&TelemTarget::Ellipse(h.clone()), &[0u8; 30]));
        assert_eq!(route_telem(&model, 6000, &[1u8; 7])?, 0);
        assert_eq!(h.read()?.position_px(), Vector2::new(10.0, 10.0));

        Ok(())
    }
}
