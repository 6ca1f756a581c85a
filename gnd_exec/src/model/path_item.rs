//! Paths and trajectories held by the model.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use comms_if::eqpt::drone::{enu_to_ned, TrajPacket, TrajPoint};

use crate::geom::m_to_px;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An ordered sequence of points in screen pixels, as drawn for the current or staged trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathModelItem {
    points_px: Vec<Vector2<f64>>,
}

/// The full output of a solve in the optimizer frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trajectory {
    pub positions_m: Vec<Vector2<f64>>,
    pub velocities_ms: Vec<Vector2<f64>>,
    pub accels_mss: Vec<Vector2<f64>>,

    /// Time between consecutive points
    pub dt_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PathModelItem {
    pub fn new(points_px: Vec<Vector2<f64>>) -> Self {
        Self { points_px }
    }

    /// Build the drawn path for a trajectory.
    pub fn from_trajectory(traj: &Trajectory) -> Self {
        Self {
            points_px: traj.positions_m.iter().map(|p| m_to_px(*p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points_px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_px.is_empty()
    }

    pub fn points_px(&self) -> &[Vector2<f64>] {
        &self.points_px
    }

    pub fn get(&self, index: usize) -> Option<Vector2<f64>> {
        self.points_px.get(index).copied()
    }

    /// Overwrite the point at `index`, returning false if it is out of range.
    pub fn set(&mut self, index: usize, point_px: Vector2<f64>) -> bool {
        match self.points_px.get_mut(index) {
            Some(p) => {
                *p = point_px;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Vector2<f64>> {
        if index < self.points_px.len() {
            Some(self.points_px.remove(index))
        } else {
            None
        }
    }

    pub fn replace(&mut self, points_px: Vec<Vector2<f64>>) {
        self.points_px = points_px;
    }

    pub fn clear(&mut self) {
        self.points_px.clear();
    }

    pub fn pop_front(&mut self) -> Option<Vector2<f64>> {
        self.remove(0)
    }
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.positions_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions_m.is_empty()
    }

    /// Remove the first state of the trajectory.
    pub fn pop_front(&mut self) {
        if !self.positions_m.is_empty() {
            self.positions_m.remove(0);
        }
        if !self.velocities_ms.is_empty() {
            self.velocities_ms.remove(0);
        }
        if !self.accels_mss.is_empty() {
            self.accels_mss.remove(0);
        }
    }

    /// Get the state at `index` as a command point at the given flight altitude.
    pub fn point(&self, index: usize, altitude_m: f64) -> Option<TrajPoint> {
        let pos = self.positions_m.get(index)?;
        let vel = self.velocities_ms.get(index).copied().unwrap_or_else(Vector2::zeros);
        let acc = self.accels_mss.get(index).copied().unwrap_or_else(Vector2::zeros);

        Some(TrajPoint {
            position_m_ned: enu_to_ned([pos.x, pos.y, altitude_m]),
            velocity_ms_ned: enu_to_ned([vel.x, vel.y, 0.0]),
            accel_mss_ned: enu_to_ned([acc.x, acc.y, 0.0]),
        })
    }

    /// Build the command packet for this trajectory.
    pub fn to_packet(&self, altitude_m: f64) -> TrajPacket {
        TrajPacket {
            dt_s: self.dt_s,
            points: (0..self.len())
                .filter_map(|i| self.point(i, altitude_m))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path_item_ops() {
        let mut p = PathModelItem::new(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
        ]);

        assert!(p.set(1, Vector2::new(1.0, 1.0)));
        assert!(!p.set(3, Vector2::zeros()));
        assert_eq!(p.get(1), Some(Vector2::new(1.0, 1.0)));

        assert_eq!(p.pop_front(), Some(Vector2::new(0.0, 0.0)));
        assert_eq!(p.remove(5), None);
        assert_eq!(p.len(), 2);

        p.clear();
        assert!(p.is_empty());
        assert_eq!(p.pop_front(), None);

        p.replace(vec![Vector2::new(5.0, 5.0), Vector2::new(6.0, 5.0)]);
        assert_eq!(p.len(), 2);
        assert_eq!(p.points_px()[1], Vector2::new(6.0, 5.0));
    }

    #[test]
    fn test_packet_frames() {
        let traj = Trajectory {
            positions_m: vec![Vector2::new(1.0, 2.0)],
            velocities_ms: vec![Vector2::new(0.5, 0.0)],
            accels_mss: vec![],
            dt_s: 0.25,
        };

        let pkt = traj.to_packet(3.0);
        assert_eq!(pkt.points.len(), 1);
        assert_eq!(pkt.points[0].position_m_ned, [2.0, 1.0, -3.0]);
        assert_eq!(pkt.points[0].velocity_ms_ned, [0.0, 0.5, -0.0]);
        assert_eq!(pkt.points[0].accel_mss_ned, [0.0, 0.0, -0.0]);

        let path = PathModelItem::from_trajectory(&traj);
        assert_eq!(path.get(0), Some(Vector2::new(100.0, -200.0)));
    }
}
