//! # Constraint Model
//!
//! The shared store of every constraint, the drones, the solver settings and the current and
//! staged trajectories.
//!
//! ## Locking
//!
//! All collections and scalars sit behind a single model lock, which is held only for the
//! duration of one accessor. Collection getters return copies of the entity handles, and each
//! entity is guarded by its own lock so a single entity can be edited without blocking the rest
//! of the model.
//!
//! Entity locks are only ever taken after the model lock has been released (or while it is held),
//! never the other way around: nothing holding an entity lock may call back into the model.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    geom::{
        non_negative, Constraint, CylinderConstraint, CylinderHandle, DroneEntity, DroneHandle,
        EllipseConstraint, EllipseHandle, PlaneConstraint, PlaneHandle, PointEntity, PointHandle,
        PolygonConstraint, PolygonHandle, Region,
    },
    telem::TelemTarget,
};

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod path_item;
mod snapshot;

pub use path_item::{PathModelItem, Trajectory};
pub use snapshot::ModelSnapshot;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Smallest number of trajectory nodes the solver accepts.
pub const MIN_HORIZON: usize = 5;

/// Largest number of trajectory nodes the solver accepts.
pub const MAX_HORIZON: usize = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The constraint model, see the module documentation.
#[derive(Debug)]
pub struct ConstraintModel {
    inner: RwLock<ModelInner>,
}

/// Initial solver settings for the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelParams {
    /// Number of trajectory nodes, K
    pub horizon: usize,

    /// Trajectory duration, tf
    pub final_time_s: f64,

    /// Clearance applied to every ellipse and cylinder
    pub clearance_m: f64,

    pub limits: VehicleLimits,

    /// Let the optimizer choose the final time
    pub free_final_time: bool,
}

/// Physical limits of the vehicle.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct VehicleLimits {
    /// Units: meters/second
    pub max_vel_ms: f64,

    /// Units: meters/second^2
    pub max_accel_mss: f64,
}

#[derive(Debug, Clone, Default)]
struct Entities {
    ellipses: Vec<EllipseHandle>,
    cylinders: Vec<CylinderHandle>,
    polygons: Vec<PolygonHandle>,
    planes: Vec<PlaneHandle>,
    waypoints: Vec<PointHandle>,
    final_points: Vec<PointHandle>,
    drones: Vec<DroneHandle>,
}

#[derive(Debug)]
struct ModelInner {
    entities: Entities,

    horizon: usize,
    final_time_s: f64,
    clearance_m: f64,
    limits: VehicleLimits,
    free_final_time: bool,

    input_validity: InputValidity,
    feasibility: Feasibility,
    solver_message: String,
    live_reference: bool,
    traj_staged: bool,
    front_counter: u64,

    current_path: PathModelItem,
    current_traj: Option<Trajectory>,
    staged_path: PathModelItem,
    staged_traj: Option<Trajectory>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Whether the last solve reached the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feasibility {
    /// Nothing has been solved yet
    Unknown,
    Feasible,
    Infeasible,
}

/// Whether the model currently describes a problem that can be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputValidity {
    Valid,
    NoDrone,
    NoTarget,
    DroneInObstacle,
    TargetInObstacle,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Sync primitive is poisoned")]
    PoisonError,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConstraintModel {
    /// Create a new empty model with the given solver settings.
    pub fn new(params: &ModelParams) -> Self {
        let final_time_s = if valid_final_time(params.final_time_s) {
            params.final_time_s
        } else {
            ModelParams::default().final_time_s
        };

        let inner = ModelInner {
            entities: Entities::default(),
            horizon: clamp_horizon(params.horizon),
            final_time_s,
            clearance_m: non_negative(params.clearance_m),
            limits: sanitise_limits(params.limits),
            free_final_time: params.free_final_time,
            input_validity: InputValidity::NoDrone,
            feasibility: Feasibility::Unknown,
            solver_message: String::new(),
            live_reference: false,
            traj_staged: false,
            front_counter: 0,
            current_path: PathModelItem::default(),
            current_traj: None,
            staged_path: PathModelItem::default(),
            staged_traj: None,
        };

        Self {
            inner: RwLock::new(inner),
        }
    }

    // ---- ENTITIES ----

    /// Add an ellipse, returning the handle used to edit or remove it.
    pub fn add_ellipse(&self, ellipse: EllipseConstraint) -> Result<EllipseHandle, ModelError> {
        let h = Arc::new(RwLock::new(ellipse));
        self.inner.write()?.entities.ellipses.push(h.clone());
        Ok(h)
    }

    pub fn remove_ellipse(&self, handle: &EllipseHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.ellipses, handle);
        Ok(())
    }

    pub fn ellipses(&self) -> Result<Vec<EllipseHandle>, ModelError> {
        Ok(self.inner.read()?.entities.ellipses.clone())
    }

    pub fn add_cylinder(&self, cylinder: CylinderConstraint) -> Result<CylinderHandle, ModelError> {
        let h = Arc::new(RwLock::new(cylinder));
        self.inner.write()?.entities.cylinders.push(h.clone());
        Ok(h)
    }

    pub fn remove_cylinder(&self, handle: &CylinderHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.cylinders, handle);
        Ok(())
    }

    pub fn cylinders(&self) -> Result<Vec<CylinderHandle>, ModelError> {
        Ok(self.inner.read()?.entities.cylinders.clone())
    }

    pub fn add_polygon(&self, polygon: PolygonConstraint) -> Result<PolygonHandle, ModelError> {
        let h = Arc::new(RwLock::new(polygon));
        self.inner.write()?.entities.polygons.push(h.clone());
        Ok(h)
    }

    pub fn remove_polygon(&self, handle: &PolygonHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.polygons, handle);
        Ok(())
    }

    pub fn polygons(&self) -> Result<Vec<PolygonHandle>, ModelError> {
        Ok(self.inner.read()?.entities.polygons.clone())
    }

    pub fn add_plane(&self, plane: PlaneConstraint) -> Result<PlaneHandle, ModelError> {
        let h = Arc::new(RwLock::new(plane));
        self.inner.write()?.entities.planes.push(h.clone());
        Ok(h)
    }

    pub fn remove_plane(&self, handle: &PlaneHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.planes, handle);
        Ok(())
    }

    pub fn planes(&self) -> Result<Vec<PlaneHandle>, ModelError> {
        Ok(self.inner.read()?.entities.planes.clone())
    }

    /// Append a waypoint, waypoints are visited in insertion order.
    pub fn add_waypoint(&self, point: PointEntity) -> Result<PointHandle, ModelError> {
        let h = Arc::new(RwLock::new(point));
        self.inner.write()?.entities.waypoints.push(h.clone());
        Ok(h)
    }

    pub fn remove_waypoint(&self, handle: &PointHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.waypoints, handle);
        Ok(())
    }

    pub fn clear_waypoints(&self) -> Result<(), ModelError> {
        self.inner.write()?.entities.waypoints.clear();
        Ok(())
    }

    pub fn waypoints(&self) -> Result<Vec<PointHandle>, ModelError> {
        Ok(self.inner.read()?.entities.waypoints.clone())
    }

    pub fn add_final_point(&self, point: PointEntity) -> Result<PointHandle, ModelError> {
        let h = Arc::new(RwLock::new(point));
        self.inner.write()?.entities.final_points.push(h.clone());
        Ok(h)
    }

    pub fn remove_final_point(&self, handle: &PointHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.final_points, handle);
        Ok(())
    }

    pub fn final_points(&self) -> Result<Vec<PointHandle>, ModelError> {
        Ok(self.inner.read()?.entities.final_points.clone())
    }

    pub fn add_drone(&self, drone: DroneEntity) -> Result<DroneHandle, ModelError> {
        let h = Arc::new(RwLock::new(drone));
        self.inner.write()?.entities.drones.push(h.clone());
        Ok(h)
    }

    pub fn remove_drone(&self, handle: &DroneHandle) -> Result<(), ModelError> {
        remove_handle(&mut self.inner.write()?.entities.drones, handle);
        Ok(())
    }

    pub fn drones(&self) -> Result<Vec<DroneHandle>, ModelError> {
        Ok(self.inner.read()?.entities.drones.clone())
    }

    /// The drone trajectories are planned for, which is the first drone added.
    pub fn current_drone(&self) -> Result<Option<DroneHandle>, ModelError> {
        Ok(self.inner.read()?.entities.drones.first().cloned())
    }

    /// The point trajectories are planned towards, which is the first final point added.
    pub fn target(&self) -> Result<Option<PointHandle>, ModelError> {
        Ok(self.inner.read()?.entities.final_points.first().cloned())
    }

    /// Remove every entity and the current trajectory.
    pub fn clear(&self) -> Result<(), ModelError> {
        let mut inner = self.inner.write()?;
        inner.entities = Entities::default();
        inner.current_path.clear();
        inner.current_traj = None;
        Ok(())
    }

    /// Increment and return the ordering counter used to bring an entity to the front.
    pub fn bring_to_front(&self) -> Result<u64, ModelError> {
        let mut inner = self.inner.write()?;
        inner.front_counter += 1;
        Ok(inner.front_counter)
    }

    // ---- SOLVER SETTINGS ----

    pub fn clearance(&self) -> Result<f64, ModelError> {
        Ok(self.inner.read()?.clearance_m)
    }

    /// Set the clearance of the model and of every ellipse and cylinder in it.
    pub fn set_clearance(&self, clearance_m: f64) -> Result<(), ModelError> {
        let clearance_m = non_negative(clearance_m);

        let (ellipses, cylinders) = {
            let mut inner = self.inner.write()?;
            inner.clearance_m = clearance_m;
            (
                inner.entities.ellipses.clone(),
                inner.entities.cylinders.clone(),
            )
        };

        for e in ellipses.iter() {
            e.write()?.set_clearance_m(clearance_m);
        }
        for c in cylinders.iter() {
            c.write()?.set_clearance_m(clearance_m);
        }

        Ok(())
    }

    pub fn horizon(&self) -> Result<usize, ModelError> {
        Ok(self.inner.read()?.horizon)
    }

    /// Set the number of trajectory nodes, clamped into `[MIN_HORIZON, MAX_HORIZON]`.
    pub fn set_horizon(&self, horizon: usize) -> Result<usize, ModelError> {
        let horizon = clamp_horizon(horizon);
        self.inner.write()?.horizon = horizon;
        Ok(horizon)
    }

    pub fn final_time(&self) -> Result<f64, ModelError> {
        Ok(self.inner.read()?.final_time_s)
    }

    /// Set the trajectory duration. Non-positive or non-finite times are rejected, keeping the
    /// previous value, in which case false is returned.
    pub fn set_final_time(&self, final_time_s: f64) -> Result<bool, ModelError> {
        if !valid_final_time(final_time_s) {
            debug!("Rejecting final time of {} s", final_time_s);
            return Ok(false);
        }

        self.inner.write()?.final_time_s = final_time_s;
        Ok(true)
    }

    pub fn limits(&self) -> Result<VehicleLimits, ModelError> {
        Ok(self.inner.read()?.limits)
    }

    pub fn set_limits(&self, limits: VehicleLimits) -> Result<(), ModelError> {
        self.inner.write()?.limits = sanitise_limits(limits);
        Ok(())
    }

    pub fn free_final_time(&self) -> Result<bool, ModelError> {
        Ok(self.inner.read()?.free_final_time)
    }

    pub fn set_free_final_time(&self, free_final_time: bool) -> Result<(), ModelError> {
        self.inner.write()?.free_final_time = free_final_time;
        Ok(())
    }

    // ---- STATUS ----

    pub fn feasibility(&self) -> Result<Feasibility, ModelError> {
        Ok(self.inner.read()?.feasibility)
    }

    pub fn set_feasibility(&self, feasibility: Feasibility) -> Result<(), ModelError> {
        self.inner.write()?.feasibility = feasibility;
        Ok(())
    }

    pub fn input_validity(&self) -> Result<InputValidity, ModelError> {
        Ok(self.inner.read()?.input_validity)
    }

    /// Set the input validity code, returning true if it changed.
    pub fn set_input_validity(&self, validity: InputValidity) -> Result<bool, ModelError> {
        let mut inner = self.inner.write()?;
        let changed = inner.input_validity != validity;
        inner.input_validity = validity;
        Ok(changed)
    }

    pub fn solver_message(&self) -> Result<String, ModelError> {
        Ok(self.inner.read()?.solver_message.clone())
    }

    pub fn live_reference(&self) -> Result<bool, ModelError> {
        Ok(self.inner.read()?.live_reference)
    }

    pub fn set_live_reference(&self, live_reference: bool) -> Result<(), ModelError> {
        self.inner.write()?.live_reference = live_reference;
        Ok(())
    }

    // ---- TRAJECTORIES ----

    pub fn current_path(&self) -> Result<PathModelItem, ModelError> {
        Ok(self.inner.read()?.current_path.clone())
    }

    pub fn current_trajectory(&self) -> Result<Option<Trajectory>, ModelError> {
        Ok(self.inner.read()?.current_traj.clone())
    }

    pub fn staged_path(&self) -> Result<PathModelItem, ModelError> {
        Ok(self.inner.read()?.staged_path.clone())
    }

    pub fn staged_trajectory(&self) -> Result<Option<Trajectory>, ModelError> {
        Ok(self.inner.read()?.staged_traj.clone())
    }

    /// Replace the current trajectory and its status in one locked section.
    ///
    /// Returns true if the feasibility changed. The staged trajectory is never touched.
    pub fn publish(
        &self,
        traj: Trajectory,
        path: PathModelItem,
        feasibility: Feasibility,
        message: String,
    ) -> Result<bool, ModelError> {
        let mut inner = self.inner.write()?;
        let changed = inner.feasibility != feasibility;

        inner.current_traj = Some(traj);
        inner.current_path = path;
        inner.feasibility = feasibility;
        inner.solver_message = message;

        Ok(changed)
    }

    /// Copy the current trajectory into the staged slot.
    ///
    /// Without a drone there is nothing to execute the trajectory, so nothing is staged and false
    /// is returned.
    pub fn stage_traj(&self) -> Result<bool, ModelError> {
        let mut inner = self.inner.write()?;

        if inner.entities.drones.is_empty() {
            return Ok(false);
        }

        inner.staged_path = inner.current_path.clone();
        inner.staged_traj = inner.current_traj.clone();
        inner.traj_staged = true;

        Ok(true)
    }

    /// Clear the staged trajectory and leave live reference mode.
    pub fn unstage_traj(&self) -> Result<(), ModelError> {
        let mut inner = self.inner.write()?;

        inner.staged_path.clear();
        inner.staged_traj = None;
        inner.traj_staged = false;
        inner.live_reference = false;

        Ok(())
    }

    pub fn is_traj_staged(&self) -> Result<bool, ModelError> {
        Ok(self.inner.read()?.traj_staged)
    }

    /// Remove the first point of the staged trajectory, returning whether any points remain.
    pub fn tick_staged(&self) -> Result<bool, ModelError> {
        let mut inner = self.inner.write()?;

        inner.staged_path.pop_front();
        if let Some(ref mut t) = inner.staged_traj {
            t.pop_front();
        }

        Ok(!inner.staged_path.is_empty())
    }

    // ---- DERIVED DATA ----

    /// Take a plain copy of everything the parameter builder needs.
    pub fn snapshot(&self) -> Result<ModelSnapshot, ModelError> {
        let (entities, mut snapshot) = {
            let inner = self.inner.read()?;
            (
                inner.entities.clone(),
                ModelSnapshot {
                    constraints: Vec::new(),
                    waypoints: Vec::new(),
                    target: None,
                    drone: None,
                    horizon: inner.horizon,
                    final_time_s: inner.final_time_s,
                    free_final_time: inner.free_final_time,
                    limits: inner.limits,
                    clearance_m: inner.clearance_m,
                },
            )
        };

        // Entity locks are taken one at a time with the model lock released
        for e in entities.ellipses.iter() {
            snapshot.constraints.push(Constraint::Ellipse(e.read()?.clone()));
        }
        for c in entities.cylinders.iter() {
            snapshot.constraints.push(Constraint::Cylinder(c.read()?.clone()));
        }
        for p in entities.polygons.iter() {
            snapshot.constraints.push(Constraint::Polygon(p.read()?.clone()));
        }
        for p in entities.planes.iter() {
            snapshot.constraints.push(Constraint::Plane(p.read()?.clone()));
        }
        for w in entities.waypoints.iter() {
            snapshot.waypoints.push(w.read()?.clone());
        }
        if let Some(t) = entities.final_points.first() {
            snapshot.target = Some(t.read()?.clone());
        }
        if let Some(d) = entities.drones.first() {
            snapshot.drone = Some(d.read()?.clone());
        }

        Ok(snapshot)
    }

    /// Recompute the overlap flag of every ellipse and cylinder, returning how many overlap.
    pub fn refresh_overlaps(&self) -> Result<usize, ModelError> {
        let (ellipses, cylinders) = {
            let inner = self.inner.read()?;
            (
                inner.entities.ellipses.clone(),
                inner.entities.cylinders.clone(),
            )
        };

        let mut regions: Vec<Region> = Vec::with_capacity(ellipses.len() + cylinders.len());
        for e in ellipses.iter() {
            regions.push(e.read()?.region().clone());
        }
        for c in cylinders.iter() {
            regions.push(c.read()?.region().clone());
        }

        let flags: Vec<bool> = (0..regions.len())
            .map(|i| {
                regions
                    .iter()
                    .enumerate()
                    .any(|(j, r)| i != j && regions[i].intersects(r))
            })
            .collect();

        let (ellipse_flags, cylinder_flags) = flags.split_at(ellipses.len());
        for (e, &f) in ellipses.iter().zip(ellipse_flags) {
            e.write()?.set_overlap(f);
        }
        for (c, &f) in cylinders.iter().zip(cylinder_flags) {
            c.write()?.set_overlap(f);
        }

        Ok(flags.iter().filter(|&&f| f).count())
    }

    /// Every entity bound to a telemetry port.
    pub fn telem_bindings(&self) -> Result<Vec<(u16, TelemTarget)>, ModelError> {
        let entities = self.inner.read()?.entities.clone();
        let mut bindings = Vec::new();

        for e in entities.ellipses {
            let port = e.read()?.port();
            if port != 0 {
                bindings.push((port, TelemTarget::Ellipse(e)));
            }
        }
        for c in entities.cylinders {
            let port = c.read()?.port();
            if port != 0 {
                bindings.push((port, TelemTarget::Cylinder(c)));
            }
        }
        for p in entities.waypoints.into_iter().chain(entities.final_points) {
            let port = p.read()?.port();
            if port != 0 {
                bindings.push((port, TelemTarget::Point(p)));
            }
        }
        for d in entities.drones {
            let port = d.read()?.port();
            if port != 0 {
                bindings.push((port, TelemTarget::Drone(d)));
            }
        }

        Ok(bindings)
    }
}

impl Default for ConstraintModel {
    fn default() -> Self {
        Self::new(&ModelParams::default())
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            horizon: 20,
            final_time_s: 15.0,
            clearance_m: 0.0,
            limits: VehicleLimits::default(),
            free_final_time: false,
        }
    }
}

impl Default for VehicleLimits {
    fn default() -> Self {
        Self {
            max_vel_ms: 5.0,
            max_accel_mss: 3.0,
        }
    }
}

impl<G> From<PoisonError<G>> for ModelError {
    fn from(_: PoisonError<G>) -> Self {
        Self::PoisonError
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn remove_handle<T>(handles: &mut Vec<Arc<RwLock<T>>>, handle: &Arc<RwLock<T>>) {
    handles.retain(|h| !Arc::ptr_eq(h, handle));
}

fn clamp_horizon(horizon: usize) -> usize {
    horizon.max(MIN_HORIZON).min(MAX_HORIZON)
}

fn valid_final_time(final_time_s: f64) -> bool {
    final_time_s.is_finite() && final_time_s > 0.0
}

fn sanitise_limits(limits: VehicleLimits) -> VehicleLimits {
    VehicleLimits {
        max_vel_ms: non_negative(limits.max_vel_ms),
        max_accel_mss: non_negative(limits.max_accel_mss),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;
    use std::thread;

    fn traj_of(n: usize) -> (Trajectory, PathModelItem) {
        let traj = Trajectory {
            positions_m: (0..n).map(|i| Vector2::new(i as f64, 0.0)).collect(),
            velocities_ms: vec![Vector2::new(1.0, 0.0); n],
            accels_mss: vec![Vector2::zeros(); n],
            dt_s: 1.0,
        };
        let path = PathModelItem::from_trajectory(&traj);
        (traj, path)
    }

    #[test]
    fn test_scalar_setters() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        assert_eq!(model.horizon()?, 20);
        assert_eq!(model.final_time()?, 15.0);

        assert_eq!(model.set_horizon(1)?, MIN_HORIZON);
        assert_eq!(model.set_horizon(10_000)?, MAX_HORIZON);

        assert!(!model.set_final_time(-1.0)?);
        assert!(!model.set_final_time(f64::INFINITY)?);
        assert_eq!(model.final_time()?, 15.0);
        assert!(model.set_final_time(8.0)?);
        assert_eq!(model.final_time()?, 8.0);

        assert!(model.set_input_validity(InputValidity::Valid)?);
        assert!(!model.set_input_validity(InputValidity::Valid)?);

        assert_eq!(model.feasibility()?, Feasibility::Unknown);
        model.set_feasibility(Feasibility::Infeasible)?;
        assert_eq!(model.feasibility()?, Feasibility::Infeasible);

        assert_eq!(model.bring_to_front()?, 1);
        assert_eq!(model.bring_to_front()?, 2);

        Ok(())
    }

    #[test]
    fn test_remove_absent_is_noop() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let kept = model.add_ellipse(EllipseConstraint::default())?;
        let other = ConstraintModel::default().add_ellipse(EllipseConstraint::default())?;

        model.remove_ellipse(&other)?;
        assert_eq!(model.ellipses()?.len(), 1);

        model.remove_ellipse(&kept)?;
        model.remove_ellipse(&kept)?;
        assert!(model.ellipses()?.is_empty());

        Ok(())
    }

    #[test]
    fn test_clearance_propagates() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let e = model.add_ellipse(EllipseConstraint::new(Vector2::zeros(), 50.0, 50.0))?;
        let c = model.add_cylinder(CylinderConstraint::new(Vector2::zeros(), 50.0, 60.0))?;

        model.set_clearance(0.25)?;
        assert_eq!(model.clearance()?, 0.25);
        assert_eq!(e.read()?.clearance_m(), 0.25);
        assert_eq!(c.read()?.clearance_m(), 0.25);
        assert!(e.read()?.region().contains(Vector2::new(70.0, 0.0)));

        Ok(())
    }

    #[test]
    fn test_overlaps() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let a = model.add_ellipse(EllipseConstraint::new(Vector2::new(0.0, 0.0), 50.0, 50.0))?;
        let b = model.add_cylinder(CylinderConstraint::new(Vector2::new(80.0, 0.0), 50.0, 50.0))?;
        let c = model.add_ellipse(EllipseConstraint::new(Vector2::new(500.0, 0.0), 50.0, 50.0))?;

        assert_eq!(model.refresh_overlaps()?, 2);
        assert!(a.read()?.overlap());
        assert!(b.read()?.overlap());
        assert!(!c.read()?.overlap());

        b.write()?.set_position_px(Vector2::new(200.0, 0.0));
        assert_eq!(model.refresh_overlaps()?, 0);
        assert!(!a.read()?.overlap());

        Ok(())
    }

    #[test]
    fn test_stage_needs_drone() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let (traj, path) = traj_of(5);
        model.publish(traj, path, Feasibility::Feasible, String::new())?;

        assert!(!model.stage_traj()?);
        assert!(!model.is_traj_staged()?);

        model.add_drone(DroneEntity::default())?;
        assert!(model.stage_traj()?);
        assert!(model.is_traj_staged()?);
        assert_eq!(model.staged_path()?.len(), 5);

        Ok(())
    }

    #[test]
    fn test_tick_staged() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        model.add_drone(DroneEntity::default())?;
        let (traj, path) = traj_of(5);
        model.publish(traj, path, Feasibility::Feasible, String::new())?;
        model.stage_traj()?;

        let ticks: Vec<bool> = (0..5).map(|_| model.tick_staged()).collect::<Result<_, _>>()?;
        assert_eq!(ticks, vec![true, true, true, true, false]);
        assert!(model.staged_path()?.is_empty());
        assert!(!model.tick_staged()?);

        Ok(())
    }

    #[test]
    fn test_publish_leaves_staged() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        model.add_drone(DroneEntity::default())?;
        let (traj, path) = traj_of(5);
        model.publish(traj, path.clone(), Feasibility::Feasible, String::new())?;
        model.stage_traj()?;

        let (traj, new_path) = traj_of(3);
        assert!(model.publish(traj, new_path.clone(), Feasibility::Infeasible, "bad".into())?);
        assert_eq!(model.current_path()?, new_path);
        assert_eq!(model.staged_path()?, path);
        assert_eq!(model.solver_message()?, "bad");

        Ok(())
    }

    #[test]
    fn test_stage_unstage_while_publishing() -> Result<(), ModelError> {
        let model = Arc::new(ConstraintModel::default());
        model.add_drone(DroneEntity::default())?;

        let publisher = {
            let model = model.clone();
            thread::spawn(move || -> Result<(), ModelError> {
                for i in 0..500 {
                    let (traj, path) = traj_of(2 + i % 7);
                    model.publish(traj, path, Feasibility::Feasible, String::new())?;
                }
                Ok(())
            })
        };

        for _ in 0..500 {
            model.stage_traj()?;
            model.unstage_traj()?;
            assert!(model.staged_path()?.is_empty());
            assert!(!model.is_traj_staged()?);
        }

        assert!(publisher.join().is_ok());
        Ok(())
    }

    #[test]
    fn test_concurrent_add_remove() -> Result<(), ModelError> {
        let model = Arc::new(ConstraintModel::default());
        let mut writers = Vec::new();

        for t in 0..4 {
            let model = model.clone();
            writers.push(thread::spawn(move || -> Result<(), ModelError> {
                for i in 0..200 {
                    let w = 10.0 + (t * 200 + i) as f64;
                    let h = model.add_ellipse(EllipseConstraint::new(Vector2::zeros(), w, w))?;
                    if i % 2 == 0 {
                        model.remove_ellipse(&h)?;
                    }
                }
                Ok(())
            }));
        }

        let reader = {
            let model = model.clone();
            thread::spawn(move || -> Result<(), ModelError> {
                for _ in 0..200 {
                    for e in model.ellipses()? {
                        let e = e.read()?;
                        // A fully constructed ellipse always has a region matching its size
                        assert_eq!(e.width_px(), e.height_px());
                        assert_eq!(e.region().points_px().len(), crate::geom::REGION_NUM_POINTS);
                    }
                    model.snapshot()?;
                }
                Ok(())
            })
        };

        for w in writers {
            assert!(matches!(w.join(), Ok(Ok(()))));
        }
        assert!(matches!(reader.join(), Ok(Ok(()))));
        assert_eq!(model.ellipses()?.len(), 4 * 100);

        Ok(())
    }

    #[test]
    fn test_snapshot_order_and_selection() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        model.add_plane(PlaneConstraint::new(Vector2::zeros(), Vector2::new(1.0, 0.0)))?;
        model.add_cylinder(CylinderConstraint::default())?;
        model.add_ellipse(EllipseConstraint::default())?;
        model.add_final_point(PointEntity::new(Vector2::new(1.0, 1.0)))?;
        model.add_final_point(PointEntity::new(Vector2::new(2.0, 2.0)))?;

        let snap = model.snapshot()?;
        let kinds: Vec<_> = snap.constraints.iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                crate::geom::ConstraintKind::Ellipse,
                crate::geom::ConstraintKind::Cylinder,
                crate::geom::ConstraintKind::Plane
            ]
        );
        assert!(snap.drone.is_none());
        assert_eq!(
            snap.target.map(|t| t.position_px()),
            Some(Vector2::new(1.0, 1.0))
        );

        Ok(())
    }

    #[test]
    fn test_telem_bindings() -> Result<(), ModelError> {
        let model = ConstraintModel::default();
        let mut e = EllipseConstraint::default();
        e.set_port(6000);
        model.add_ellipse(e)?;
        model.add_ellipse(EllipseConstraint::default())?;
        let mut d = DroneEntity::default();
        d.set_endpoint("10.0.0.2", 7000);
        model.add_drone(d)?;

        let ports: Vec<u16> = model.telem_bindings()?.iter().map(|(p, _)| *p).collect();
        assert_eq!(ports, vec![6000, 7000]);

        Ok(())
    }
}
