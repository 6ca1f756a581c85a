//! Linear (polygon and plane) half-space constraints.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

use crate::{
    geom::{px_to_m, Constraint, PlaneConstraint, PolygonConstraint},
    model::ModelSnapshot,
    solver::{SolverParams, MAX_HALFSPACES},
};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// One inequality `a . x <= b`.
pub type HalfSpace = (Vector2<f64>, f64);

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The half-space to the left of the directed segment `u -> v` in the optimizer frame.
///
/// `a` is the unit right-hand normal of the segment, so points on the left satisfy `a . x <= b`.
/// Returns `None` for a zero length segment.
pub fn halfspace(u_m: Vector2<f64>, v_m: Vector2<f64>) -> Option<HalfSpace> {
    let d = v_m - u_m;
    let len = d.norm();

    if len <= f64::EPSILON || !len.is_finite() {
        return None;
    }

    let a = Vector2::new(d.y, -d.x) / len;
    Some((a, a.dot(&u_m)))
}

/// Rows for every edge of a polygon, including the wrap-around edge.
///
/// The vertices are first put into counter-clockwise order, so with the direction flag unset the
/// interior satisfies every row. Setting the flag reverses every edge.
pub fn polygon_rows(polygon: &PolygonConstraint) -> Vec<HalfSpace> {
    let edges: Vec<(Vector2<f64>, Vector2<f64>)> = polygon
        .edges_px()
        .map(|(p, q)| (px_to_m(p), px_to_m(q)))
        .collect();

    // Edges of a counter-clockwise polygon keep the inside on their left
    let ccw = signed_area(&edges) >= 0.0;

    edges
        .into_iter()
        .filter_map(|(p, q)| {
            if ccw != polygon.direction() {
                halfspace(p, q)
            } else {
                halfspace(q, p)
            }
        })
        .collect()
}

/// The row for a plane.
pub fn plane_row(plane: &PlaneConstraint) -> Option<HalfSpace> {
    let (u, v) = plane.directed_px();
    halfspace(px_to_m(u), px_to_m(v))
}

/// Write every polygon, then every plane, into the half-space arrays.
///
/// A constraint is written whole or not at all, so a polygon whose rows do not all fit is
/// dropped. Returns the number of rows which did not fit.
pub(super) fn write_halfspaces(snapshot: &ModelSnapshot, params: &mut SolverParams) -> usize {
    let polygons = snapshot.constraints.iter().filter_map(|c| match c {
        Constraint::Polygon(p) => Some(polygon_rows(p)),
        _ => None,
    });
    let planes = snapshot.constraints.iter().filter_map(|c| match c {
        Constraint::Plane(p) => Some(plane_row(p).into_iter().collect::<Vec<_>>()),
        _ => None,
    });

    let mut dropped = 0;
    params.n_halfspaces = 0;

    for rows in polygons.chain(planes) {
        if params.n_halfspaces + rows.len() > MAX_HALFSPACES {
            dropped += rows.len();
            continue;
        }

        for (a, b) in rows {
            params.hs_a[params.n_halfspaces] = a;
            params.hs_b[params.n_halfspaces] = b;
            params.n_halfspaces += 1;
        }
    }

    dropped
}

/// Signed area of a polygon, positive for counter-clockwise vertices.
fn signed_area(edges: &[(Vector2<f64>, Vector2<f64>)]) -> f64 {
    edges.iter().map(|(p, q)| p.perp(q)).sum::<f64>() * 0.5
}
