//! # Telecommand module
//!
//! This module provides the operator telecommands accepted by the ground station, either from a
//! script or from an operator interface. Telecommands are encoded as externally tagged JSON, for
//! example `"Stage"` or `{"SetHorizon": 30}`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Payload of an [`Tc::AddEllipse`] command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EllipseTc {
    /// Centre of the ellipse in screen pixels
    pub position_px: [f64; 2],

    /// Semi-axis along the ellipse's local x axis, in pixels
    pub width_px: f64,

    /// Semi-axis along the ellipse's local y axis, in pixels
    pub height_px: f64,

    /// Screen rotation, clockwise positive
    #[serde(default)]
    pub rotation_deg: f64,

    /// Telemetry port the ellipse follows, 0 for a fixed ellipse
    #[serde(default)]
    pub port: i64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction given to the ground station by the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Tc {
    /// Stage the current trajectory for execution
    Stage,

    /// Remove any staged trajectory
    Unstage,

    /// Execute the staged trajectory
    Execute,

    /// Choose between simulated playback and sending to the drone on execute
    SetSimulated(bool),

    /// Enable or disable live reference (frozen) mode
    Freeze(bool),

    /// Set the number of trajectory nodes
    SetHorizon(usize),

    /// Set the trajectory's final time in seconds
    SetFinalTime(f64),

    /// Set the clearance applied around every ellipse and cylinder, in meters
    SetClearance(f64),

    /// Let the optimizer choose the final time
    SetFreeFinalTime(bool),

    AddEllipse(EllipseTc),

    AddWaypoint {
        position_px: [f64; 2]
    },

    ClearWaypoints,

    /// Move (or create) the target final point
    SetTarget {
        position_px: [f64; 2]
    },

    /// Move the current drone
    MoveDrone {
        position_px: [f64; 2]
    },

    /// Feed a raw telemetry packet to whatever is bound to `port`, the packet being base64 encoded.
    InjectTelem {
        port: u16,
        b64_data: String
    },

    /// Save the current layout into the given file
    SaveLayout(PathBuf),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC contains invalid base64 data: {0}")]
    InvalidB64(base64::DecodeError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str.trim()).map_err(TcParseError::InvalidJson)
    }

    /// Serialize the TC into a JSON string
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Decode the payload of an [`Tc::InjectTelem`] command.
pub fn decode_telem_data(b64_data: &str) -> Result<Vec<u8>, TcParseError> {
    base64::decode(b64_data.trim()).map_err(TcParseError::InvalidB64)
}

/// Encode raw telemetry bytes for an [`Tc::InjectTelem`] command.
pub fn encode_telem_data(bytes: &[u8]) -> String {
    base64::encode(bytes)
}
