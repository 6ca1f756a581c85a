//! # Drone Equipment Communications Module
//!
//! Binary packet layouts exchanged with the drones:
//!
//! - [`TelemPacket`] - telemetry from a drone (or any tracked object), giving position and
//!   optionally velocity and acceleration in the North-East-Down (NED) frame.
//! - [`TrajPacket`] - a trajectory command sent to a drone.
//!
//! All values are little endian `f64`s.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::net::Ipv4Addr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Lowest port a drone endpoint or telemetry binding may use.
pub const MIN_PORT: u16 = 1024;

/// Size of one 3-vector in a packet.
const VEC3_LEN: usize = 3 * 8;

/// Size of a position only telemetry packet.
pub const TELEM_POS_LEN: usize = VEC3_LEN;

/// Size of a position and velocity telemetry packet.
pub const TELEM_POS_VEL_LEN: usize = 2 * VEC3_LEN;

/// Size of a position, velocity and acceleration telemetry packet.
pub const TELEM_FULL_LEN: usize = 3 * VEC3_LEN;

/// Size of the trajectory packet header, the number of points (`u32`) and the time step (`f64`).
const TRAJ_HEADER_LEN: usize = 4 + 8;

/// Size of each point in a trajectory packet.
const TRAJ_POINT_LEN: usize = 3 * VEC3_LEN;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network destination of a drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneEndpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

/// Telemetry received from a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemPacket {
    /// Position in the NED frame
    ///
    /// Units: meters
    pub position_m_ned: [f64; 3],

    /// Velocity in the NED frame, if included in the packet
    ///
    /// Units: meters/second
    pub velocity_ms_ned: Option<[f64; 3]>,

    /// Acceleration in the NED frame, if included in the packet
    ///
    /// Units: meters/second^2
    pub accel_mss_ned: Option<[f64; 3]>,
}

/// A single point of a commanded trajectory, all in the NED frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajPoint {
    pub position_m_ned: [f64; 3],
    pub velocity_ms_ned: [f64; 3],
    pub accel_mss_ned: [f64; 3],
}

/// A trajectory command sent to a drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajPacket {
    /// Time between consecutive points
    pub dt_s: f64,

    /// The points of the trajectory, the first point is the current state of the drone.
    pub points: Vec<TrajPoint>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DroneEndpoint {
    /// Create a new endpoint, resetting invalid values to safe defaults.
    ///
    /// An unparsable address becomes `0.0.0.0`, a port outside `1024..=65535` becomes `0`.
    pub fn new(ip: &str, port: i64) -> Self {
        Self {
            ip: sanitise_ip(ip),
            port: sanitise_port(port),
        }
    }

    /// Returns true if the endpoint can actually be sent to.
    pub fn is_valid(&self) -> bool {
        !self.ip.is_unspecified() && self.port != 0
    }
}

impl Default for DroneEndpoint {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            port: 0,
        }
    }
}

impl TelemPacket {
    /// Deserialize a telemetry packet.
    ///
    /// The layout is decided by the length of the packet, see the module documentation. Any other
    /// length, or non-finite values, give `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (has_vel, has_acc) = match bytes.len() {
            TELEM_POS_LEN => (false, false),
            TELEM_POS_VEL_LEN => (true, false),
            TELEM_FULL_LEN => (true, true),
            _ => return None,
        };

        let pkt = Self {
            position_m_ned: read_vec3(&bytes[0..VEC3_LEN]),
            velocity_ms_ned: if has_vel {
                Some(read_vec3(&bytes[VEC3_LEN..2 * VEC3_LEN]))
            } else {
                None
            },
            accel_mss_ned: if has_acc {
                Some(read_vec3(&bytes[2 * VEC3_LEN..3 * VEC3_LEN]))
            } else {
                None
            },
        };

        let all_finite = pkt
            .position_m_ned
            .iter()
            .chain(pkt.velocity_ms_ned.iter().flatten())
            .chain(pkt.accel_mss_ned.iter().flatten())
            .all(|v| v.is_finite());

        if all_finite {
            Some(pkt)
        } else {
            None
        }
    }

    /// Serialize the packet, the length depending on which optional fields are present.
    ///
    /// An acceleration without a velocity cannot be represented, so a zero velocity is written in
    /// that case.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TELEM_FULL_LEN);
        write_vec3(&mut buf, &self.position_m_ned);

        match (self.velocity_ms_ned, self.accel_mss_ned) {
            (None, None) => (),
            (Some(v), None) => write_vec3(&mut buf, &v),
            (v, Some(a)) => {
                write_vec3(&mut buf, &v.unwrap_or_default());
                write_vec3(&mut buf, &a);
            }
        }

        buf
    }
}

impl TrajPacket {
    /// Serialize the packet for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TRAJ_HEADER_LEN + self.points.len() * TRAJ_POINT_LEN);

        let mut header = [0u8; TRAJ_HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], self.points.len() as u32);
        LittleEndian::write_f64(&mut header[4..12], self.dt_s);
        buf.extend_from_slice(&header);

        for p in self.points.iter() {
            write_vec3(&mut buf, &p.position_m_ned);
            write_vec3(&mut buf, &p.velocity_ms_ned);
            write_vec3(&mut buf, &p.accel_mss_ned);
        }

        buf
    }

    /// Deserialize a packet, returning `None` if the length does not match the header.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TRAJ_HEADER_LEN {
            return None;
        }

        let num_points = LittleEndian::read_u32(&bytes[0..4]) as usize;
        let dt_s = LittleEndian::read_f64(&bytes[4..12]);

        if bytes.len() != TRAJ_HEADER_LEN + num_points * TRAJ_POINT_LEN {
            return None;
        }

        let points = bytes[TRAJ_HEADER_LEN..]
            .chunks_exact(TRAJ_POINT_LEN)
            .map(|c| TrajPoint {
                position_m_ned: read_vec3(&c[0..VEC3_LEN]),
                velocity_ms_ned: read_vec3(&c[VEC3_LEN..2 * VEC3_LEN]),
                accel_mss_ned: read_vec3(&c[2 * VEC3_LEN..3 * VEC3_LEN]),
            })
            .collect();

        Some(Self { dt_s, points })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Reset a port outside the user range to 0, which means "unbound".
pub fn sanitise_port(port: i64) -> u16 {
    if port >= MIN_PORT as i64 && port <= u16::MAX as i64 {
        port as u16
    } else {
        0
    }
}

/// Parse a dotted IPv4 address, resetting an invalid one to `0.0.0.0`.
pub fn sanitise_ip(ip: &str) -> Ipv4Addr {
    ip.trim().parse().unwrap_or(Ipv4Addr::UNSPECIFIED)
}

/// Convert a NED vector into the East-North-Up frame used by the planner.
pub fn ned_to_enu(v: [f64; 3]) -> [f64; 3] {
    [v[1], v[0], -v[2]]
}

/// Convert an East-North-Up vector into the NED frame.
pub fn enu_to_ned(v: [f64; 3]) -> [f64; 3] {
    [v[1], v[0], -v[2]]
}

fn read_vec3(bytes: &[u8]) -> [f64; 3] {
    let mut v = [0f64; 3];
    LittleEndian::read_f64_into(bytes, &mut v);
    v
}

fn write_vec3(buf: &mut Vec<u8>, v: &[f64; 3]) {
    let mut bytes = [0u8; VEC3_LEN];
    LittleEndian::write_f64_into(v, &mut bytes);
    buf.extend_from_slice(&bytes);
}
