//! Convex polygonal regions used for overlap and containment tests.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};
use serde::Serialize;

use super::REGION_NUM_POINTS;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A convex outline in screen pixels.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Region {
    points_px: Vec<Vector2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Region {
    /// Create a region from the points of a convex outline, in either winding order.
    pub fn new(points_px: Vec<Vector2<f64>>) -> Self {
        Self { points_px }
    }

    /// Sample the outline of an ellipse with the given semi-axes and screen rotation.
    pub fn ellipse(
        centre_px: Vector2<f64>,
        semi_x_px: f64,
        semi_y_px: f64,
        rotation_deg: f64,
    ) -> Self {
        let phi = rotation_deg.to_radians();
        let rot = Matrix2::new(phi.cos(), -phi.sin(), phi.sin(), phi.cos());

        let points_px = (0..REGION_NUM_POINTS)
            .map(|i| {
                let t = 2.0 * PI * (i as f64) / (REGION_NUM_POINTS as f64);
                centre_px + rot * Vector2::new(semi_x_px * t.cos(), semi_y_px * t.sin())
            })
            .collect();

        Self { points_px }
    }

    pub fn points_px(&self) -> &[Vector2<f64>] {
        &self.points_px
    }

    pub fn is_empty(&self) -> bool {
        self.points_px.is_empty()
    }

    /// Returns true if the point lies inside or on the boundary of the region.
    pub fn contains(&self, point_px: Vector2<f64>) -> bool {
        if self.points_px.len() < 3 {
            return false;
        }

        let mut has_pos = false;
        let mut has_neg = false;

        for (p, q) in self.edges() {
            let edge = q - p;
            if edge.norm_squared() == 0.0 {
                continue;
            }

            let cross = edge.perp(&(point_px - p));
            if cross > 0.0 {
                has_pos = true;
            } else if cross < 0.0 {
                has_neg = true;
            }

            if has_pos && has_neg {
                return false;
            }
        }

        true
    }

    /// Returns true if the two regions overlap, using the separating axis test.
    ///
    /// Regions which only touch are considered to overlap.
    pub fn intersects(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        let mut num_axes = 0;

        for (p, q) in self.edges().chain(other.edges()) {
            let edge = q - p;
            if edge.norm_squared() == 0.0 {
                continue;
            }
            num_axes += 1;

            let axis = Vector2::new(-edge.y, edge.x);
            let (min_a, max_a) = self.project(&axis);
            let (min_b, max_b) = other.project(&axis);

            if max_a < min_b || max_b < min_a {
                return false;
            }
        }

        // Both regions have collapsed onto single points
        if num_axes == 0 {
            return (self.points_px[0] - other.points_px[0]).norm_squared() == 0.0;
        }

        true
    }

    fn edges(&self) -> impl Iterator<Item = (Vector2<f64>, Vector2<f64>)> + '_ {
        let n = self.points_px.len();
        (0..n).map(move |i| (self.points_px[i], self.points_px[(i + 1) % n]))
    }

    fn project(&self, axis: &Vector2<f64>) -> (f64, f64) {
        self.points_px
            .iter()
            .map(|p| p.dot(axis))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Region {
        Region::new(vec![
            Vector2::new(x, y),
            Vector2::new(x + size, y),
            Vector2::new(x + size, y + size),
            Vector2::new(x, y + size),
        ])
    }

    #[test]
    fn test_ellipse_sampling() {
        let r = Region::ellipse(Vector2::new(100.0, 50.0), 40.0, 20.0, 90.0);
        assert_eq!(r.points_px().len(), REGION_NUM_POINTS);

        // Rotated by 90 degrees the long axis lies along screen y
        assert!((r.points_px()[0] - Vector2::new(100.0, 90.0)).norm() < 1e-9);
        assert!(r.contains(Vector2::new(100.0, 85.0)));
        assert!(!r.contains(Vector2::new(135.0, 50.0)));
    }

    #[test]
    fn test_contains_either_winding() {
        let ccw = square(0.0, 0.0, 10.0);
        let mut pts = ccw.points_px().to_vec();
        pts.reverse();
        let cw = Region::new(pts);

        for r in [ccw, cw].iter() {
            assert!(r.contains(Vector2::new(5.0, 5.0)));
            assert!(r.contains(Vector2::new(10.0, 5.0)));
            assert!(!r.contains(Vector2::new(11.0, 5.0)));
        }
    }

    #[test]
    fn test_separating_axis() {
        let a = square(0.0, 0.0, 10.0);

        assert!(a.intersects(&square(5.0, 5.0, 10.0)));
        assert!(a.intersects(&square(10.0, 0.0, 10.0)));
        assert!(!a.intersects(&square(10.5, 0.0, 10.0)));

        // Diagonal neighbours whose bounding boxes overlap but which don't touch
        let diamond = Region::new(vec![
            Vector2::new(13.0, 9.5),
            Vector2::new(16.5, 13.0),
            Vector2::new(13.0, 16.5),
            Vector2::new(9.5, 13.0),
        ]);
        assert!(!a.intersects(&diamond));
        assert!(!a.intersects(&Region::default()));
    }
}
