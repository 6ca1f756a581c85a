//! # Layout files
//!
//! A layout is a plain text description of every entity in the model, so a set of constraints can
//! be saved and loaded again later. The format is line oriented:
//!
//! ```text
//! Ellipse:
//! Position: 300, 200
//! Width: 80
//! Height: 40
//! Rotation: 30
//! Waypoints:
//! Position: 100, 100
//! Position: 200, 100
//! Polygons:
//! Vertex: 0, 0, 100, 0, 100, 100
//! Direction: 1
//! Drone:
//! Position: 0, 0
//! Ip: 192.168.1.20
//! Port: 14550
//! End
//! ```
//!
//! `Ellipse:`, `Cylinder:` and `Drone:` headers each start one new entity. The other sections hold
//! a list, where each `Position`, `Vertex` or `Endpoints` line adds one entity and any other key
//! applies to the last one added. Blank lines and lines starting with `#` are ignored, as is
//! anything after `End`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt, fs, path::Path};

use log::info;
use nalgebra::Vector2;

use crate::{
    geom::{
        CylinderConstraint, DroneEntity, EllipseConstraint, GeomError, PlaneConstraint,
        PointEntity, PolygonConstraint,
    },
    model::{ConstraintModel, ModelError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Every entity of a model, detached from it.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub ellipses: Vec<EllipseConstraint>,
    pub cylinders: Vec<CylinderConstraint>,
    pub waypoints: Vec<PointEntity>,
    pub polygons: Vec<PolygonConstraint>,
    pub planes: Vec<PlaneConstraint>,
    pub final_points: Vec<PointEntity>,
    pub drones: Vec<DroneEntity>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Ellipse,
    Cylinder,
    Waypoints,
    Polygons,
    Planes,
    FinalPoints,
    Drone,
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Could not access the layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {0}: expected a section header before any values")]
    NoSection(usize),

    #[error("Line {line}: {key:?} is not a valid key here")]
    UnknownKey { line: usize, key: String },

    #[error("Line {line}: could not parse {value:?}")]
    InvalidValue { line: usize, value: String },

    #[error("Line {line}: {key} expects {expected} values, found {found}")]
    WrongArity {
        line: usize,
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: Vertex expects an even number of values, found {found}")]
    OddCoordinates { line: usize, found: usize },

    #[error("Line {0}: there is no entity for this value to apply to")]
    NoEntity(usize),

    #[error("Line {0}: {1}")]
    Geom(usize, GeomError),

    #[error("Could not read the model: {0}")]
    ModelError(#[from] ModelError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Layout {
    /// Parse a layout from its text form.
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let mut layout = Layout::default();
        let mut section: Option<Section> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_num = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "End" {
                break;
            }

            if let Some(s) = section_header(line) {
                match s {
                    Section::Ellipse => layout.ellipses.push(EllipseConstraint::default()),
                    Section::Cylinder => layout.cylinders.push(CylinderConstraint::default()),
                    Section::Drone => layout.drones.push(DroneEntity::default()),
                    _ => (),
                }
                section = Some(s);
                continue;
            }

            let (key, value) = match line.split_once(':') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => {
                    return Err(LayoutError::InvalidValue {
                        line: line_num,
                        value: line.into(),
                    })
                }
            };

            match section {
                Some(s) => layout.parse_value(s, key, value, line_num)?,
                None => return Err(LayoutError::NoSection(line_num)),
            }
        }

        Ok(layout)
    }

    /// Write the layout in its text form.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Copy every entity out of a model.
    pub fn from_model(model: &ConstraintModel) -> Result<Self, ModelError> {
        let mut layout = Layout::default();

        for e in model.ellipses()? {
            layout.ellipses.push(e.read()?.clone());
        }
        for c in model.cylinders()? {
            layout.cylinders.push(c.read()?.clone());
        }
        for w in model.waypoints()? {
            layout.waypoints.push(w.read()?.clone());
        }
        for p in model.polygons()? {
            layout.polygons.push(p.read()?.clone());
        }
        for p in model.planes()? {
            layout.planes.push(p.read()?.clone());
        }
        for f in model.final_points()? {
            layout.final_points.push(f.read()?.clone());
        }
        for d in model.drones()? {
            layout.drones.push(d.read()?.clone());
        }

        Ok(layout)
    }

    /// Replace every entity in the model with those of the layout.
    pub fn apply(&self, model: &ConstraintModel) -> Result<(), ModelError> {
        model.clear()?;

        for e in self.ellipses.iter() {
            model.add_ellipse(e.clone())?;
        }
        for c in self.cylinders.iter() {
            model.add_cylinder(c.clone())?;
        }
        for w in self.waypoints.iter() {
            model.add_waypoint(w.clone())?;
        }
        for p in self.polygons.iter() {
            model.add_polygon(p.clone())?;
        }
        for p in self.planes.iter() {
            model.add_plane(p.clone())?;
        }
        for f in self.final_points.iter() {
            model.add_final_point(f.clone())?;
        }
        for d in self.drones.iter() {
            model.add_drone(d.clone())?;
        }

        Ok(())
    }

    /// Total number of entities in the layout.
    pub fn num_entities(&self) -> usize {
        self.ellipses.len()
            + self.cylinders.len()
            + self.waypoints.len()
            + self.polygons.len()
            + self.planes.len()
            + self.final_points.len()
            + self.drones.len()
    }

    fn parse_value(
        &mut self,
        section: Section,
        key: &str,
        value: &str,
        line: usize,
    ) -> Result<(), LayoutError> {
        let unknown = || LayoutError::UnknownKey {
            line,
            key: key.into(),
        };

        match section {
            Section::Ellipse => {
                let e = self.ellipses.last_mut().ok_or(LayoutError::NoEntity(line))?;
                match key {
                    "Position" => e.set_position_px(parse_vec2(key, value, line)?),
                    "Width" => e.set_width_px(parse_scalar(value, line)?),
                    "Height" => e.set_height_px(parse_scalar(value, line)?),
                    "Rotation" => e.set_rotation_deg(parse_scalar(value, line)?),
                    "Clearance" => e.set_clearance_m(parse_scalar(value, line)?),
                    "Direction" => e.set_direction(parse_bool(value, line)?),
                    "Port" => e.set_port(parse_int(value, line)?),
                    _ => return Err(unknown()),
                }
            }
            Section::Cylinder => {
                let c = self.cylinders.last_mut().ok_or(LayoutError::NoEntity(line))?;
                match key {
                    "Position" => c.set_position_px(parse_vec2(key, value, line)?),
                    "Width" => c.set_width_px(parse_scalar(value, line)?),
                    "Height" => c.set_height_px(parse_scalar(value, line)?),
                    "Trigger" => c.set_trigger_width_px(parse_scalar(value, line)?),
                    "Rotation" => c.set_rotation_deg(parse_scalar(value, line)?),
                    "Clearance" => c.set_clearance_m(parse_scalar(value, line)?),
                    "Port" => c.set_port(parse_int(value, line)?),
                    _ => return Err(unknown()),
                }
            }
            Section::Waypoints | Section::FinalPoints => {
                let points = if section == Section::Waypoints {
                    &mut self.waypoints
                } else {
                    &mut self.final_points
                };
                match key {
                    "Position" => points.push(PointEntity::new(parse_vec2(key, value, line)?)),
                    "Port" => points
                        .last_mut()
                        .ok_or(LayoutError::NoEntity(line))?
                        .set_port(parse_int(value, line)?),
                    _ => return Err(unknown()),
                }
            }
            Section::Polygons => match key {
                "Vertex" => {
                    let coords = parse_list(value, line)?;
                    if coords.len() % 2 != 0 {
                        return Err(LayoutError::OddCoordinates {
                            line,
                            found: coords.len(),
                        });
                    }
                    let verts = coords
                        .chunks(2)
                        .map(|c| Vector2::new(c[0], c[1]))
                        .collect();
                    let poly =
                        PolygonConstraint::new(verts).map_err(|e| LayoutError::Geom(line, e))?;
                    self.polygons.push(poly);
                }
                "Direction" => self
                    .polygons
                    .last_mut()
                    .ok_or(LayoutError::NoEntity(line))?
                    .set_direction(parse_bool(value, line)?),
                _ => return Err(unknown()),
            },
            Section::Planes => match key {
                "Endpoints" => {
                    let c = parse_fixed(key, value, line, 4)?;
                    self.planes.push(PlaneConstraint::new(
                        Vector2::new(c[0], c[1]),
                        Vector2::new(c[2], c[3]),
                    ));
                }
                "Direction" => {
                    self.planes
                        .last_mut()
                        .ok_or(LayoutError::NoEntity(line))?
                        .direction = parse_bool(value, line)?
                }
                _ => return Err(unknown()),
            },
            Section::Drone => {
                let d = self.drones.last_mut().ok_or(LayoutError::NoEntity(line))?;
                match key {
                    "Position" => d.set_position_px(parse_vec2(key, value, line)?),
                    "Ip" => {
                        let port = d.endpoint().port as i64;
                        d.set_endpoint(value, port);
                    }
                    "Port" => {
                        let ip = d.endpoint().ip.to_string();
                        d.set_endpoint(&ip, parse_int(value, line)?);
                    }
                    _ => return Err(unknown()),
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.ellipses.iter() {
            writeln!(f, "Ellipse:")?;
            write_ellipse_body(f, e)?;
        }

        for c in self.cylinders.iter() {
            writeln!(f, "Cylinder:")?;
            writeln!(f, "Position: {}, {}", c.position_px().x, c.position_px().y)?;
            writeln!(f, "Width: {}", c.width_px())?;
            writeln!(f, "Height: {}", c.height_px())?;
            writeln!(f, "Trigger: {}", c.trigger_width_px())?;
            writeln!(f, "Rotation: {}", c.rotation_deg())?;
            writeln!(f, "Clearance: {}", c.clearance_m())?;
            if c.port() != 0 {
                writeln!(f, "Port: {}", c.port())?;
            }
        }

        if !self.waypoints.is_empty() {
            writeln!(f, "Waypoints:")?;
            write_points(f, &self.waypoints)?;
        }

        if !self.polygons.is_empty() {
            writeln!(f, "Polygons:")?;
            for p in self.polygons.iter() {
                let coords: Vec<String> = p
                    .vertices_px()
                    .iter()
                    .map(|v| format!("{}, {}", v.x, v.y))
                    .collect();
                writeln!(f, "Vertex: {}", coords.join(", "))?;
                writeln!(f, "Direction: {}", p.direction() as u8)?;
            }
        }

        if !self.planes.is_empty() {
            writeln!(f, "Planes:")?;
            for p in self.planes.iter() {
                writeln!(
                    f,
                    "Endpoints: {}, {}, {}, {}",
                    p.p1_px.x, p.p1_px.y, p.p2_px.x, p.p2_px.y
                )?;
                writeln!(f, "Direction: {}", p.direction as u8)?;
            }
        }

        if !self.final_points.is_empty() {
            writeln!(f, "Final Points:")?;
            write_points(f, &self.final_points)?;
        }

        for d in self.drones.iter() {
            writeln!(f, "Drone:")?;
            writeln!(f, "Position: {}, {}", d.position_px().x, d.position_px().y)?;
            writeln!(f, "Ip: {}", d.endpoint().ip)?;
            writeln!(f, "Port: {}", d.endpoint().port)?;
        }

        writeln!(f, "End")
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a layout file.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Layout, LayoutError> {
    let text = fs::read_to_string(path.as_ref())?;
    let layout = Layout::parse(&text)?;

    info!(
        "Loaded {} entities from layout {:?}",
        layout.num_entities(),
        path.as_ref()
    );

    Ok(layout)
}

/// Save a layout file, creating any missing parent directories.
pub fn save_file<P: AsRef<Path>>(layout: &Layout, path: P) -> Result<(), LayoutError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path.as_ref(), layout.to_text())?;

    info!(
        "Saved {} entities to layout {:?}",
        layout.num_entities(),
        path.as_ref()
    );

    Ok(())
}

fn section_header(line: &str) -> Option<Section> {
    match line {
        "Ellipse:" => Some(Section::Ellipse),
        "Cylinder:" => Some(Section::Cylinder),
        "Waypoints:" => Some(Section::Waypoints),
        "Polygons:" => Some(Section::Polygons),
        "Planes:" => Some(Section::Planes),
        "Final Points:" => Some(Section::FinalPoints),
        "Drone:" => Some(Section::Drone),
        _ => None,
    }
}

fn write_ellipse_body(f: &mut fmt::Formatter<'_>, e: &EllipseConstraint) -> fmt::Result {
    writeln!(f, "Position: {}, {}", e.position_px().x, e.position_px().y)?;
    writeln!(f, "Width: {}", e.width_px())?;
    writeln!(f, "Height: {}", e.height_px())?;
    writeln!(f, "Rotation: {}", e.rotation_deg())?;
    writeln!(f, "Clearance: {}", e.clearance_m())?;
    if e.direction() {
        writeln!(f, "Direction: 1")?;
    }
    if e.port() != 0 {
        writeln!(f, "Port: {}", e.port())?;
    }
    Ok(())
}

fn write_points(f: &mut fmt::Formatter<'_>, points: &[PointEntity]) -> fmt::Result {
    for p in points {
        writeln!(f, "Position: {}, {}", p.position_px().x, p.position_px().y)?;
        if p.port() != 0 {
            writeln!(f, "Port: {}", p.port())?;
        }
    }
    Ok(())
}

fn parse_list(value: &str, line: usize) -> Result<Vec<f64>, LayoutError> {
    value.split(',').map(|v| parse_scalar(v, line)).collect()
}

fn parse_fixed(key: &str, value: &str, line: usize, n: usize) -> Result<Vec<f64>, LayoutError> {
    let values = parse_list(value, line)?;
    if values.len() != n {
        return Err(LayoutError::WrongArity {
            line,
            key: key.into(),
            expected: n,
            found: values.len(),
        });
    }
    Ok(values)
}

fn parse_vec2(key: &str, value: &str, line: usize) -> Result<Vector2<f64>, LayoutError> {
    let v = parse_fixed(key, value, line, 2)?;
    Ok(Vector2::new(v[0], v[1]))
}

fn parse_scalar(value: &str, line: usize) -> Result<f64, LayoutError> {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LayoutError::InvalidValue {
            line,
            value: value.into(),
        }),
    }
}

fn parse_int(value: &str, line: usize) -> Result<i64, LayoutError> {
    value.trim().parse().map_err(|_| LayoutError::InvalidValue {
        line,
        value: value.trim().into(),
    })
}

fn parse_bool(value: &str, line: usize) -> Result<bool, LayoutError> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        v => Err(LayoutError::InvalidValue {
            line,
            value: v.into(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LAYOUT: &str = "\
# Two obstacles and a gate
Ellipse:
Position: 300, 200
Width: 80
Height: 40
Rotation: 30
Port: 6001

Cylinder:
Position: 600, 200
Width: 50
Trigger: 120
Waypoints:
Position: 100, 100
Position: 200, 100
Port: 6002
Polygons:
Vertex: -100, -100, 900, -100, 900, 600, -100, 600
Direction: 0
Planes:
Endpoints: 0, 500, 800, 500
Direction: 1
Final Points:
Position: 800, 400
Drone:
Position: 0, 0
Ip: 192.168.1.20
Port: 14550
End
Ellipse:
This is ignored
";

    #[test]
    fn test_parse() -> Result<(), LayoutError> {
        let layout = Layout::parse(LAYOUT)?;

        assert_eq!(layout.ellipses.len(), 1);
        assert_eq!(layout.ellipses[0].position_px(), Vector2::new(300.0, 200.0));
        assert_eq!(layout.ellipses[0].rotation_deg(), 30.0);
        assert_eq!(layout.ellipses[0].port(), 6001);

        assert_eq!(layout.cylinders[0].trigger_width_px(), 120.0);
        assert_eq!(layout.waypoints.len(), 2);
        assert_eq!(layout.waypoints[0].port(), 0);
        assert_eq!(layout.waypoints[1].port(), 6002);
        assert_eq!(layout.polygons[0].num_vertices(), 4);
        assert!(layout.planes[0].direction);
        assert_eq!(layout.final_points.len(), 1);

        let endpoint = layout.drones[0].endpoint();
        assert_eq!(endpoint.ip.to_string(), "192.168.1.20");
        assert_eq!(endpoint.port, 14550);
        assert_eq!(layout.num_entities(), 8);

        Ok(())
    }

    #[test]
    fn test_text_round_trip_through_model() -> Result<(), LayoutError> {
        let model = ConstraintModel::default();
        Layout::parse(LAYOUT)?.apply(&model)?;

        assert_eq!(model.ellipses()?.len(), 1);
        assert!(model.target()?.is_some());
        assert!(model.current_drone()?.is_some());

        let text = Layout::from_model(&model)?.to_text();
        let reparsed = Layout::parse(&text)?;

        assert_eq!(reparsed.num_entities(), 8);
        assert_eq!(reparsed.to_text(), text);

        // Applying replaces rather than appends
        reparsed.apply(&model)?;
        assert_eq!(model.waypoints()?.len(), 2);

        Ok(())
    }

    #[test]
    fn test_errors_report_line() {
        assert!(matches!(
            Layout::parse("Position: 1, 2\n"),
            Err(LayoutError::NoSection(1))
        ));
        assert!(matches!(
            Layout::parse("Ellipse:\nPosition: 1\n"),
            Err(LayoutError::WrongArity { line: 2, .. })
        ));
        assert!(matches!(
            Layout::parse("Waypoints:\n\nSize: 3\n"),
            Err(LayoutError::UnknownKey { line: 3, .. })
        ));
        assert!(matches!(
            Layout::parse("Ellipse:\nWidth: wide\n"),
            Err(LayoutError::InvalidValue { line: 2, .. })
        ));
        assert!(matches!(
            Layout::parse("Polygons:\nVertex: 0, 0, 1, 1\n"),
            Err(LayoutError::Geom(2, GeomError::TooFewVertices(2)))
        ));
        assert!(matches!(
            Layout::parse("Polygons:\nVertex: 0, 0, 1, 1, 2\n"),
            Err(LayoutError::OddCoordinates { line: 2, found: 5 })
        ));
        assert!(matches!(
            Layout::parse("Planes:\nDirection: 1\n"),
            Err(LayoutError::NoEntity(2))
        ));
    }

    #[test]
    fn test_out_of_range_values_corrected() -> Result<(), LayoutError> {
        let layout = Layout::parse("Ellipse:\nWidth: -5\nPort: 80\nDrone:\nIp: not an ip\n")?;

        assert_eq!(layout.ellipses[0].width_px(), 0.0);
        assert_eq!(layout.ellipses[0].port(), 0);
        assert!(layout.drones[0].endpoint().ip.is_unspecified());

        Ok(())
    }

    #[test]
    fn test_file_round_trip() -> Result<(), LayoutError> {
        let path = std::env::temp_dir()
            .join(format!("gnd_layout_test_{}", std::process::id()))
            .join("layout.txt");

        let layout = Layout::parse(LAYOUT)?;
        save_file(&layout, &path)?;
        let loaded = load_file(&path)?;

        assert_eq!(loaded.to_text(), layout.to_text());
        Ok(())
    }
}
