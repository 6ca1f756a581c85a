//! # Telecommand processor module
//!
//! The telecommand processor handles the TCs coming from the script or the operator.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, warn};
use nalgebra::Vector2;

// Internal
use comms_if::tc::{decode_telem_data, EllipseTc, Tc};
use gnd_lib::{
    data_store::DataStore,
    geom::{DroneEntity, EllipseConstraint, PointEntity},
    layout::{self, Layout},
    telem,
};

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a telecommand.
///
/// A TC which cannot be executed is logged and otherwise ignored.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) {
    debug!("Recieved {:?}", tc);

    if let Err(e) = try_exec(ds, tc) {
        warn!("Could not execute TC {:?}: {:?}", tc, e);
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn try_exec(ds: &mut DataStore, tc: &Tc) -> Result<()> {
    match tc {
        Tc::Stage => {
            if !ds.traj_mgr.stage()? {
                warn!("No trajectory to stage yet");
            }
        }
        Tc::Unstage => ds.traj_mgr.unstage()?,
        Tc::Execute => ds.traj_mgr.execute(&mut ds.sink)?,
        Tc::SetSimulated(s) => ds.traj_mgr.set_simulated(*s),
        Tc::Freeze(f) => ds.traj_mgr.set_freeze(*f)?,
        Tc::SetHorizon(k) => {
            let applied = ds.model.set_horizon(*k)?;
            if applied != *k {
                warn!("Horizon {} is out of range, using {}", k, applied);
            }
        }
        Tc::SetFinalTime(tf) => {
            if !ds.model.set_final_time(*tf)? {
                warn!("Final time {} rejected, it must be positive", tf);
            }
        }
        Tc::SetClearance(c) => ds.model.set_clearance(*c)?,
        Tc::SetFreeFinalTime(f) => ds.model.set_free_final_time(*f)?,
        Tc::AddEllipse(e) => add_ellipse(ds, e)?,
        Tc::AddWaypoint { position_px } => {
            ds.model.add_waypoint(PointEntity::new(to_px(position_px)))?;
        }
        Tc::ClearWaypoints => ds.model.clear_waypoints()?,
        Tc::SetTarget { position_px } => match ds.model.target()? {
            Some(t) => {
                let mut t = t.write().map_err(|_| eyre!("Target lock is poisoned"))?;
                t.set_position_px(to_px(position_px));
            }
            None => {
                ds.model
                    .add_final_point(PointEntity::new(to_px(position_px)))?;
            }
        },
        Tc::MoveDrone { position_px } => match ds.model.current_drone()? {
            Some(d) => {
                let mut d = d.write().map_err(|_| eyre!("Drone lock is poisoned"))?;
                d.set_position_px(to_px(position_px));
            }
            None => {
                ds.model.add_drone(DroneEntity::new(to_px(position_px)))?;
            }
        },
        Tc::InjectTelem { port, b64_data } => {
            let bytes = decode_telem_data(b64_data)?;
            let num_updated = telem::route_telem(&ds.model, *port, &bytes)?;
            if num_updated > 0 {
                ds.model.refresh_overlaps()?;
            }
        }
        Tc::SaveLayout(path) => {
            let path = ds.session_path(path);
            layout::save_file(&Layout::from_model(&ds.model)?, &path)
                .wrap_err_with(|| format!("Failed to save layout to {:?}", path))?;
        }
    }

    Ok(())
}

fn add_ellipse(ds: &DataStore, e: &EllipseTc) -> Result<()> {
    let mut ellipse = EllipseConstraint::new(to_px(&e.position_px), e.width_px, e.height_px);
    ellipse.set_rotation_deg(e.rotation_deg);
    ellipse.set_clearance_m(ds.model.clearance()?);
    ellipse.set_port(e.port);

    ds.model.add_ellipse(ellipse)?;
    ds.model.refresh_overlaps()?;

    Ok(())
}

fn to_px(p: &[f64; 2]) -> Vector2<f64> {
    Vector2::new(p[0], p[1])
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{path::PathBuf, sync::Arc};

    use gnd_lib::{model::ConstraintModel, traj_mgr::TrajMgrParams};

    fn data_store() -> DataStore {
        DataStore::new(
            Arc::new(ConstraintModel::default()),
            TrajMgrParams::default(),
            std::env::temp_dir().join("gnd_exec_tc_test"),
        )
    }

    #[test]
    fn test_target_and_drone_are_moved_not_duplicated() -> Result<()> {
        let mut ds = data_store();

        exec(&mut ds, &Tc::SetTarget { position_px: [100.0, -100.0] });
        exec(&mut ds, &Tc::SetTarget { position_px: [300.0, -100.0] });
        exec(&mut ds, &Tc::MoveDrone { position_px: [0.0, 0.0] });
        exec(&mut ds, &Tc::MoveDrone { position_px: [10.0, 0.0] });

        assert_eq!(ds.model.final_points()?.len(), 1);
        assert_eq!(ds.model.drones()?.len(), 1);

        let target = ds.model.target()?.and_then(|t| t.read().ok().map(|t| t.position_px()));
        assert_eq!(target, Some(Vector2::new(300.0, -100.0)));

        Ok(())
    }

    #[test]
    fn test_settings_and_rejections() -> Result<()> {
        let mut ds = data_store();

        exec(&mut ds, &Tc::SetHorizon(1000));
        assert_eq!(ds.model.horizon()?, gnd_lib::model::MAX_HORIZON);

        let tf = ds.model.final_time()?;
        exec(&mut ds, &Tc::SetFinalTime(-1.0));
        assert_eq!(ds.model.final_time()?, tf);

        exec(&mut ds, &Tc::SetClearance(0.5));
        exec(
            &mut ds,
            &Tc::AddEllipse(EllipseTc {
                position_px: [200.0, -200.0],
                width_px: 50.0,
                height_px: 50.0,
                rotation_deg: 0.0,
                port: 0,
            }),
        );
        let ellipses = ds.model.ellipses()?;
        assert_eq!(ellipses.len(), 1);
        assert!(matches!(ellipses[0].read().map(|e| e.clearance_m()), Ok(c) if c == 0.5));

        // Nothing staged, so executing is refused without side effects
        exec(&mut ds, &Tc::Execute);
        assert_eq!(ds.sink.num_sent(), 0);

        Ok(())
    }

    #[test]
    fn test_save_layout_relative_to_session() -> Result<()> {
        let mut ds = data_store();

        exec(&mut ds, &Tc::AddWaypoint { position_px: [150.0, -50.0] });
        exec(&mut ds, &Tc::SaveLayout(PathBuf::from("saved.layout")));

        let l = layout::load_file(ds.session_root.join("saved.layout"))?;
        assert_eq!(l.waypoints.len(), 1);

        Ok(())
    }
}
