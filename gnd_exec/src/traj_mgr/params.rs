//! Parameters for the trajectory manager

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct TrajMgrParams {
    /// Time between two points of a simulated playback or frozen reference
    ///
    /// Units: seconds
    pub playback_tick_s: f64,

    /// Play trajectories back on the ground instead of sending them to the drone
    pub simulated: bool,

    /// Altitude the planar trajectory is flown at
    ///
    /// Units: meters
    pub flight_altitude_m: f64,
}

impl Default for TrajMgrParams {
    fn default() -> Self {
        Self {
            playback_tick_s: 0.1,
            simulated: true,
            flight_altitude_m: 1.5,
        }
    }
}
