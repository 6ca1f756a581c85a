//! # Trajectory Manager
//!
//! Controls the lifecycle of a trajectory once the operator has picked it:
//!
//! ```text
//! Unstaged --stage--> Staged --execute--> Executing(Simulated | Sent)
//!                       |  ^
//!            freeze on  |  | freeze off
//!                       v  |
//!                      Frozen
//! ```
//!
//! `unstage` returns to `Unstaged` from any state. Simulated playback and a frozen reference both
//! consume the staged trajectory one point per playback tick, and unstage once it is exhausted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use comms_if::eqpt::drone::TrajPacket;
use util::session;

use crate::{
    geom::px_to_m,
    model::{ConstraintModel, ModelError, PathModelItem},
};

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod sink;

pub use params::TrajMgrParams;
pub use sink::{CmdSink, SessionSink, SinkError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct TrajMgr {
    params: TrajMgrParams,
    model: Arc<ConstraintModel>,

    state: TrajState,
    simulated: bool,

    /// Command packet built for the staged trajectory
    packet: Option<TrajPacket>,

    /// Session time of the last playback tick, `None` until the first step after starting
    last_tick_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrajState {
    /// No trajectory picked, the current trajectory follows the model
    Unstaged,

    /// The current trajectory has been copied aside ready for execution
    Staged,

    /// The staged trajectory is being flown
    Executing(ExecMode),

    /// The staged trajectory is held as the live reference
    Frozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecMode {
    /// Played back on the ground by moving the drone entity
    Simulated,

    /// Sent to the drone
    Sent,
}

#[derive(Debug, thiserror::Error)]
pub enum TrajMgrError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),

    #[error("Cannot {0} while the trajectory is {1:?}")]
    InvalidTransition(&'static str, TrajState),

    #[error("There is no staged trajectory to execute")]
    NothingStaged,

    #[error("There is no drone to send the trajectory to")]
    NoDrone,

    #[error("Could not send the trajectory: {0}")]
    SinkError(#[from] SinkError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajMgr {
    pub fn new(model: Arc<ConstraintModel>, params: TrajMgrParams) -> Self {
        Self {
            simulated: params.simulated,
            params,
            model,
            state: TrajState::Unstaged,
            packet: None,
            last_tick_s: None,
        }
    }

    pub fn state(&self) -> TrajState {
        self.state
    }

    pub fn simulated(&self) -> bool {
        self.simulated
    }

    /// Choose between simulated playback and sending to the drone, used by the next `execute`.
    pub fn set_simulated(&mut self, simulated: bool) {
        self.simulated = simulated;
    }

    /// The packet which will be, or was, sent for the staged trajectory.
    pub fn packet(&self) -> Option<&TrajPacket> {
        self.packet.as_ref()
    }

    /// Stage the current trajectory.
    ///
    /// Returns false without changing state if there is no drone to execute the trajectory.
    pub fn stage(&mut self) -> Result<bool, TrajMgrError> {
        if !matches!(self.state, TrajState::Unstaged | TrajState::Staged) {
            return Err(TrajMgrError::InvalidTransition("stage", self.state));
        }

        if !self.model.stage_traj()? {
            warn!("Cannot stage a trajectory without a drone");
            return Ok(false);
        }

        let packet = self
            .model
            .staged_trajectory()?
            .map(|t| t.to_packet(self.params.flight_altitude_m));

        if let Some(ref p) = packet {
            session::save_with_timestamp("staged/traj.json", p.clone());
        }
        self.packet = packet;

        self.set_state(TrajState::Staged);
        Ok(true)
    }

    /// Drop the staged trajectory, stopping any playback.
    pub fn unstage(&mut self) -> Result<(), TrajMgrError> {
        self.model.unstage_traj()?;
        self.packet = None;
        self.last_tick_s = None;

        self.set_state(TrajState::Unstaged);
        Ok(())
    }

    /// Execute the staged trajectory, either by starting the playback or by sending it through the
    /// sink.
    pub fn execute(&mut self, sink: &mut dyn CmdSink) -> Result<(), TrajMgrError> {
        if self.state != TrajState::Staged {
            return Err(TrajMgrError::InvalidTransition("execute", self.state));
        }

        if self.model.staged_path()?.is_empty() {
            return Err(TrajMgrError::NothingStaged);
        }

        if self.simulated {
            self.last_tick_s = None;
            self.set_state(TrajState::Executing(ExecMode::Simulated));
            return Ok(());
        }

        let packet = self.packet.as_ref().ok_or(TrajMgrError::NothingStaged)?;
        let endpoint = match self.model.current_drone()? {
            Some(d) => {
                let d = d.read().map_err(|_| ModelError::PoisonError)?;
                d.endpoint()
            }
            None => return Err(TrajMgrError::NoDrone),
        };

        sink.send(&endpoint, packet)?;

        self.set_state(TrajState::Executing(ExecMode::Sent));
        Ok(())
    }

    /// Hold the staged trajectory as the live reference, or release it.
    pub fn set_freeze(&mut self, freeze: bool) -> Result<(), TrajMgrError> {
        match (freeze, self.state) {
            (true, TrajState::Staged) => {
                self.model.set_live_reference(true)?;
                self.last_tick_s = None;
                self.set_state(TrajState::Frozen);
            }
            (false, TrajState::Frozen) => {
                self.model.set_live_reference(false)?;
                self.set_state(TrajState::Staged);
            }
            // Already in the requested state
            (true, TrajState::Frozen) | (false, TrajState::Staged) => (),
            (_, state) => return Err(TrajMgrError::InvalidTransition("freeze", state)),
        }

        Ok(())
    }

    /// Step the manager at the given session time.
    pub fn step(&mut self, now_s: f64, sink: &mut dyn CmdSink) -> Result<(), TrajMgrError> {
        match self.state {
            TrajState::Executing(ExecMode::Simulated) | TrajState::Frozen => (),
            _ => return Ok(()),
        }

        // The first step after starting only sets the time base
        let last_tick_s = match self.last_tick_s {
            Some(t) => t,
            None => {
                self.last_tick_s = Some(now_s);
                return Ok(());
            }
        };

        if now_s - last_tick_s < self.params.playback_tick_s {
            return Ok(());
        }
        self.last_tick_s = Some(now_s);

        match self.state {
            TrajState::Executing(ExecMode::Simulated) => self.playback_tick()?,
            TrajState::Frozen => self.reference_tick(sink)?,
            _ => (),
        }

        if self.model.staged_path()?.is_empty() {
            info!("Staged trajectory complete");
            self.unstage()?;
        }

        Ok(())
    }

    /// The path the drone is being guided along: the staged path while it is held as the live
    /// reference, otherwise the current path.
    pub fn reference_path(&self) -> Result<PathModelItem, TrajMgrError> {
        if self.model.live_reference()? {
            Ok(self.model.staged_path()?)
        } else {
            Ok(self.model.current_path()?)
        }
    }

    /// Move the drone to the next staged point.
    fn playback_tick(&mut self) -> Result<(), TrajMgrError> {
        let next_px = self.model.staged_path()?.get(0);
        let next_vel = self
            .model
            .staged_trajectory()?
            .and_then(|t| t.velocities_ms.first().copied());

        if let (Some(p), Some(d)) = (next_px, self.model.current_drone()?) {
            let mut d = d.write().map_err(|_| ModelError::PoisonError)?;
            d.set_position_px(p);
            if let Some(v) = next_vel {
                d.set_velocity_ms(v);
            }
            debug!("Playback moved drone to {:?} m", px_to_m(p));
        }

        self.model.tick_staged()?;
        Ok(())
    }

    /// Send the next staged point to the drone as its setpoint.
    fn reference_tick(&mut self, sink: &mut dyn CmdSink) -> Result<(), TrajMgrError> {
        let setpoint = self
            .model
            .staged_trajectory()?
            .and_then(|t| t.point(0, self.params.flight_altitude_m).map(|p| (t.dt_s, p)));

        let endpoint = match self.model.current_drone()? {
            Some(d) => {
                let d = d.read().map_err(|_| ModelError::PoisonError)?;
                Some(d.endpoint())
            }
            None => None,
        };

        if let (Some((dt_s, point)), Some(endpoint)) = (setpoint, endpoint) {
            let packet = TrajPacket {
                dt_s,
                points: vec![point],
            };

            // A lost setpoint is superseded by the next tick
            if let Err(e) = sink.send(&endpoint, &packet) {
                warn!("Could not send reference setpoint: {}", e);
            }
        }

        self.model.tick_staged()?;
        Ok(())
    }

    fn set_state(&mut self, state: TrajState) {
        if self.state != state {
            info!("Trajectory {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use comms_if::eqpt::drone::DroneEndpoint;
    use nalgebra::Vector2;

    use crate::{
        geom::DroneEntity,
        model::{Feasibility, Trajectory},
    };

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<(DroneEndpoint, TrajPacket)>,
    }

    impl CmdSink for RecordingSink {
        fn send(&mut self, endpoint: &DroneEndpoint, packet: &TrajPacket) -> Result<(), SinkError> {
            self.sent.push((*endpoint, packet.clone()));
            Ok(())
        }
    }

    fn params() -> TrajMgrParams {
        TrajMgrParams {
            playback_tick_s: 0.1,
            simulated: true,
            flight_altitude_m: 2.0,
        }
    }

    /// A model with a drone and a published trajectory of `n` points along x.
    fn model_with_traj(n: usize) -> Result<Arc<ConstraintModel>, ModelError> {
        let model = Arc::new(ConstraintModel::default());
        let mut drone = DroneEntity::new(Vector2::zeros());
        drone.set_endpoint("10.0.0.5", 14550);
        model.add_drone(drone)?;

        let traj = Trajectory {
            positions_m: (0..n).map(|i| Vector2::new(i as f64, 0.0)).collect(),
            velocities_ms: vec![Vector2::new(1.0, 0.0); n],
            accels_mss: vec![Vector2::zeros(); n],
            dt_s: 0.5,
        };
        let path = PathModelItem::from_trajectory(&traj);
        model.publish(traj, path, Feasibility::Feasible, String::new())?;

        Ok(model)
    }

    #[test]
    fn test_stage_needs_drone() -> Result<(), TrajMgrError> {
        let model = Arc::new(ConstraintModel::default());
        let mut mgr = TrajMgr::new(model, params());

        assert!(!mgr.stage()?);
        assert_eq!(mgr.state(), TrajState::Unstaged);
        assert!(mgr.packet().is_none());

        Ok(())
    }

    #[test]
    fn test_sent_execution() -> Result<(), TrajMgrError> {
        let model = model_with_traj(4)?;
        let mut mgr = TrajMgr::new(model.clone(), params());
        mgr.set_simulated(false);
        let mut sink = RecordingSink::default();

        assert!(matches!(
            mgr.execute(&mut sink),
            Err(TrajMgrError::InvalidTransition("execute", TrajState::Unstaged))
        ));

        assert!(mgr.stage()?);
        assert_eq!(mgr.packet().map(|p| p.points.len()), Some(4));

        mgr.execute(&mut sink)?;
        assert_eq!(mgr.state(), TrajState::Executing(ExecMode::Sent));
        assert_eq!(sink.sent.len(), 1);

        let (endpoint, packet) = &sink.sent[0];
        assert_eq!(endpoint.port, 14550);
        assert_eq!(packet.dt_s, 0.5);
        // East 1 m at 2 m altitude is north 0, east 1, down -2
        assert_eq!(packet.points[1].position_m_ned, [0.0, 1.0, -2.0]);

        // Sent trajectories stay executing until unstaged
        mgr.step(0.0, &mut sink)?;
        mgr.step(10.0, &mut sink)?;
        assert_eq!(mgr.state(), TrajState::Executing(ExecMode::Sent));
        assert!(matches!(
            mgr.stage(),
            Err(TrajMgrError::InvalidTransition("stage", _))
        ));

        mgr.unstage()?;
        assert_eq!(mgr.state(), TrajState::Unstaged);
        assert!(model.staged_path()?.is_empty());
        assert!(!model.is_traj_staged()?);

        Ok(())
    }

    #[test]
    fn test_simulated_playback() -> Result<(), TrajMgrError> {
        let model = model_with_traj(3)?;
        let mut mgr = TrajMgr::new(model.clone(), params());
        let mut sink = RecordingSink::default();

        mgr.stage()?;
        mgr.execute(&mut sink)?;
        assert_eq!(mgr.state(), TrajState::Executing(ExecMode::Simulated));
        assert!(sink.sent.is_empty());

        // Time base, then a tick too early
        mgr.step(1.0, &mut sink)?;
        mgr.step(1.05, &mut sink)?;
        assert_eq!(model.staged_path()?.len(), 3);

        mgr.step(1.25, &mut sink)?;
        assert_eq!(model.staged_path()?.len(), 2);
        mgr.step(1.5, &mut sink)?;
        assert_eq!(model.staged_path()?.len(), 1);

        let drone = model.current_drone()?.ok_or(TrajMgrError::NoDrone)?;
        assert_eq!(
            px_to_m(drone.read().map_err(|_| ModelError::PoisonError)?.position_px()),
            Vector2::new(1.0, 0.0)
        );

        mgr.step(1.75, &mut sink)?;
        assert_eq!(mgr.state(), TrajState::Unstaged);
        assert!(!model.is_traj_staged()?);

        Ok(())
    }

    #[test]
    fn test_freeze_holds_reference() -> Result<(), TrajMgrError> {
        let model = model_with_traj(5)?;
        let mut mgr = TrajMgr::new(model.clone(), params());
        let mut sink = RecordingSink::default();

        assert!(matches!(
            mgr.set_freeze(true),
            Err(TrajMgrError::InvalidTransition("freeze", TrajState::Unstaged))
        ));

        mgr.stage()?;
        mgr.set_freeze(true)?;
        assert_eq!(mgr.state(), TrajState::Frozen);
        assert!(model.live_reference()?);

        // A new solve changes the current path but not the reference
        let traj = Trajectory {
            positions_m: vec![Vector2::new(9.0, 9.0); 2],
            ..Default::default()
        };
        let path = PathModelItem::from_trajectory(&traj);
        model.publish(traj, path.clone(), Feasibility::Feasible, String::new())?;
        assert_eq!(mgr.reference_path()?.len(), 5);

        mgr.step(0.0, &mut sink)?;
        mgr.step(0.5, &mut sink)?;
        assert_eq!(sink.sent.len(), 1);
        assert_eq!(sink.sent[0].1.points.len(), 1);
        assert_eq!(mgr.reference_path()?.len(), 4);

        mgr.set_freeze(false)?;
        assert_eq!(mgr.state(), TrajState::Staged);
        assert!(!model.live_reference()?);
        assert_eq!(mgr.reference_path()?, path);

        Ok(())
    }

    #[test]
    fn test_frozen_path_exhausts() -> Result<(), TrajMgrError> {
        let model = model_with_traj(2)?;
        let mut mgr = TrajMgr::new(model.clone(), params());
        let mut sink = RecordingSink::default();

        mgr.stage()?;
        mgr.set_freeze(true)?;
        mgr.step(0.0, &mut sink)?;
        mgr.step(0.5, &mut sink)?;
        mgr.step(1.0, &mut sink)?;

        assert_eq!(sink.sent.len(), 2);
        assert_eq!(mgr.state(), TrajState::Unstaged);
        assert!(!model.live_reference()?);

        Ok(())
    }
}
