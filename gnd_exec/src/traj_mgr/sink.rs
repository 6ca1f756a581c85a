//! Destinations for trajectory command packets.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::Serialize;

use comms_if::eqpt::drone::{DroneEndpoint, TrajPacket};
use util::session;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can deliver a trajectory packet to a drone.
pub trait CmdSink {
    fn send(&mut self, endpoint: &DroneEndpoint, packet: &TrajPacket) -> Result<(), SinkError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sink which archives every packet in the session instead of transmitting it.
#[derive(Debug, Default)]
pub struct SessionSink {
    num_sent: u64,
}

#[derive(Debug, Serialize)]
struct SentPacket {
    seq: u64,
    endpoint: DroneEndpoint,
    num_bytes: usize,
    packet: TrajPacket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Cannot send to {0:?}, the drone has no valid address")]
    InvalidEndpoint(DroneEndpoint),

    #[error("Cannot send an empty trajectory")]
    EmptyPacket,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SessionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets accepted by the sink.
    pub fn num_sent(&self) -> u64 {
        self.num_sent
    }
}

impl CmdSink for SessionSink {
    fn send(&mut self, endpoint: &DroneEndpoint, packet: &TrajPacket) -> Result<(), SinkError> {
        if !endpoint.is_valid() {
            return Err(SinkError::InvalidEndpoint(*endpoint));
        }
        if packet.points.is_empty() {
            return Err(SinkError::EmptyPacket);
        }

        self.num_sent += 1;

        debug!(
            "Sending {} point trajectory to {}:{}",
            packet.points.len(),
            endpoint.ip,
            endpoint.port
        );

        session::save_with_timestamp(
            "traj_cmds/traj_cmd.json",
            SentPacket {
                seq: self.num_sent,
                endpoint: *endpoint,
                num_bytes: packet.to_bytes().len(),
                packet: packet.clone(),
            },
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::drone::TrajPoint;

    #[test]
    fn test_session_sink_checks() {
        let mut sink = SessionSink::new();
        let packet = TrajPacket {
            dt_s: 0.1,
            points: vec![TrajPoint {
                position_m_ned: [1.0, 2.0, -1.5],
                velocity_ms_ned: [0.0; 3],
                accel_mss_ned: [0.0; 3],
            }],
        };

        assert!(matches!(
            sink.send(&DroneEndpoint::default(), &packet),
            Err(SinkError::InvalidEndpoint(_))
        ));

        let endpoint = DroneEndpoint::new("192.168.1.20", 14550);
        assert!(matches!(
            sink.send(&endpoint, &TrajPacket { dt_s: 0.1, points: vec![] }),
            Err(SinkError::EmptyPacket)
        ));

        assert!(sink.send(&endpoint, &packet).is_ok());
        assert_eq!(sink.num_sent(), 1);
    }
}
