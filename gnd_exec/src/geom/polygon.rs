//! Polygon constraints.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

use super::GeomError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A closed polygon whose edges become half-space constraints.
///
/// With `direction` unset the interior of the polygon is the free space.
#[derive(Debug, Clone, Serialize)]
pub struct PolygonConstraint {
    vertices_px: Vec<Vector2<f64>>,
    direction: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PolygonConstraint {
    pub fn new(vertices_px: Vec<Vector2<f64>>) -> Result<Self, GeomError> {
        if vertices_px.len() < 3 {
            return Err(GeomError::TooFewVertices(vertices_px.len()));
        }

        Ok(Self {
            vertices_px,
            direction: false,
        })
    }

    pub fn vertices_px(&self) -> &[Vector2<f64>] {
        &self.vertices_px
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices_px.len()
    }

    /// Get a vertex, the index wrapping around the vertex count.
    pub fn vertex_px(&self, index: usize) -> Vector2<f64> {
        self.vertices_px[index % self.vertices_px.len()]
    }

    /// Move a vertex, the index wrapping around the vertex count.
    pub fn set_vertex_px(&mut self, index: usize, position_px: Vector2<f64>) {
        let n = self.vertices_px.len();
        self.vertices_px[index % n] = position_px;
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    pub fn set_direction(&mut self, direction: bool) {
        self.direction = direction;
    }

    /// Every edge of the polygon including the wrap-around edge from the last vertex to the first.
    pub fn edges_px(&self) -> impl Iterator<Item = (Vector2<f64>, Vector2<f64>)> + '_ {
        (0..self.vertices_px.len()).map(move |i| (self.vertex_px(i), self.vertex_px(i + 1)))
    }

    /// Mean of the vertices.
    pub fn centroid_px(&self) -> Vector2<f64> {
        self.vertices_px.iter().sum::<Vector2<f64>>() / (self.vertices_px.len() as f64)
    }
}
