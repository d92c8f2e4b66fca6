//! Motion-command payloads: the `(master_id, sub_id)`-tagged commands that
//! drive the drive's internal Velocity Acceleration Interpolator (VAI) or
//! its point/velocity/acceleration setpoint streamer.

use super::parameter::{CommandParameter, ParamType};

/// Immutable descriptors for the engineering quantities carried by motion
/// commands. Values are never stored on these; see
/// [`crate::codec::parameter`] for why.
pub mod schema {
    use super::{CommandParameter, ParamType};

    pub const TARGET_POSITION: CommandParameter =
        CommandParameter::new("Target position", "m", 1e7, ParamType::Sint32);
    pub const MAXIMAL_VELOCITY: CommandParameter =
        CommandParameter::new("Maximal velocity", "m/s", 1e6, ParamType::Uint32);
    pub const ACCELERATION: CommandParameter =
        CommandParameter::new("Acceleration", "m/s^2", 1e5, ParamType::Uint32);
    pub const DECELERATION: CommandParameter =
        CommandParameter::new("Deceleration", "m/s^2", 1e5, ParamType::Uint32);
    pub const DEMAND_POSITION: CommandParameter =
        CommandParameter::new("Demand position", "m", 1e7, ParamType::Sint32);
    pub const DEMAND_VELOCITY: CommandParameter =
        CommandParameter::new("Demand velocity", "m/s", 1e6, ParamType::Sint32);
    pub const DEMAND_ACCELERATION: CommandParameter =
        CommandParameter::new("Demand acceleration", "m/s^2", 1e5, ParamType::Sint32);
    pub const VELOCITY: CommandParameter = CommandParameter::new("Velocity", "m/s", 1e6, ParamType::Uint32);
    /// Signed monitoring-channel velocity slot, the parameter every axis's
    /// `go_to_pos`/`move_with_constant_velocity` measured-velocity readback
    /// is configured against.
    pub const VELOCITY_SIGNED: CommandParameter =
        CommandParameter::new("velocity", "m/s", 1e6, ParamType::Sint32);
}

/// A motion command, carrying its own engineering-unit values.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    Noop,
    /// Point-to-point move via the drive's VAI profile generator.
    VaiGoToPos {
        position: f64,
        max_velocity: f64,
        acceleration: f64,
        deceleration: f64,
    },
    /// Position-only streamed setpoint.
    PStream { demand_position: f64 },
    /// Position/velocity streamed setpoint.
    PvStream {
        demand_position: f64,
        demand_velocity: f64,
    },
    /// Position/velocity/acceleration streamed setpoint.
    PvaStream {
        demand_position: f64,
        demand_velocity: f64,
        demand_acceleration: f64,
    },
    StopStreaming,
    /// Write a single live parameter by UPID. `value` is the raw integer to
    /// write, already scaled by the caller to the parameter's native units
    /// (the target parameter's conversion factor is drive-internal and not
    /// generally known to the host).
    WriteLiveParameter { upid: u16, value: i64, ty: ParamType },
    AccVaiInfinitePositive { velocity: f64, acceleration: f64 },
    AccVaiInfiniteNegative { velocity: f64, acceleration: f64 },
    VaiStop { deceleration: f64 },
}

impl MotionCommand {
    pub fn master_id(&self) -> u8 {
        match self {
            MotionCommand::Noop => 0x00,
            MotionCommand::VaiGoToPos { .. } | MotionCommand::VaiStop { .. } => 0x01,
            MotionCommand::PStream { .. }
            | MotionCommand::PvStream { .. }
            | MotionCommand::PvaStream { .. }
            | MotionCommand::StopStreaming => 0x03,
            MotionCommand::WriteLiveParameter { .. } => 0x04,
            MotionCommand::AccVaiInfinitePositive { .. } | MotionCommand::AccVaiInfiniteNegative { .. } => 0x0C,
        }
    }

    pub fn sub_id(&self) -> u8 {
        match self {
            MotionCommand::Noop => 0x0,
            MotionCommand::VaiGoToPos { .. } => 0x0,
            MotionCommand::VaiStop { .. } => 0x7,
            MotionCommand::PvStream { .. } => 0x1,
            MotionCommand::PStream { .. } => 0x2,
            // `PvStream` configured-period variant shares sub_id 0x3 with the
            // slave-timestamped variant's 0x1 in the catalog this protocol was
            // modeled on; this crate only implements the configured-period
            // streaming family used by `Controller::start_stream`.
            MotionCommand::PvaStream { .. } => 0x5,
            MotionCommand::StopStreaming => 0xF,
            MotionCommand::WriteLiveParameter { .. } => 0xF,
            MotionCommand::AccVaiInfinitePositive { .. } => 0xE,
            MotionCommand::AccVaiInfiniteNegative { .. } => 0xF,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MotionCommand::Noop => "No operation",
            MotionCommand::VaiGoToPos { .. } => "VAI go to position",
            MotionCommand::PStream { .. } => "P stream",
            MotionCommand::PvStream { .. } => "PV stream",
            MotionCommand::PvaStream { .. } => "PVA stream",
            MotionCommand::StopStreaming => "Stop streaming",
            MotionCommand::WriteLiveParameter { .. } => "Write live parameter",
            MotionCommand::AccVaiInfinitePositive { .. } => "AccVAI infinite motion, positive direction",
            MotionCommand::AccVaiInfiniteNegative { .. } => "AccVAI infinite motion, negative direction",
            MotionCommand::VaiStop { .. } => "VAI stop",
        }
    }

    /// Parameter bytes, in wire order, for this command's variant.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            MotionCommand::Noop | MotionCommand::StopStreaming => Vec::new(),
            MotionCommand::VaiGoToPos {
                position,
                max_velocity,
                acceleration,
                deceleration,
            } => {
                let mut out = schema::TARGET_POSITION.encode(*position);
                out.extend(schema::MAXIMAL_VELOCITY.encode(*max_velocity));
                out.extend(schema::ACCELERATION.encode(*acceleration));
                out.extend(schema::DECELERATION.encode(*deceleration));
                out
            }
            MotionCommand::PStream { demand_position } => schema::DEMAND_POSITION.encode(*demand_position),
            MotionCommand::PvStream {
                demand_position,
                demand_velocity,
            } => {
                let mut out = schema::DEMAND_POSITION.encode(*demand_position);
                out.extend(schema::DEMAND_VELOCITY.encode(*demand_velocity));
                out
            }
            MotionCommand::PvaStream {
                demand_position,
                demand_velocity,
                demand_acceleration,
            } => {
                let mut out = schema::DEMAND_POSITION.encode(*demand_position);
                out.extend(schema::DEMAND_VELOCITY.encode(*demand_velocity));
                out.extend(schema::DEMAND_ACCELERATION.encode(*demand_acceleration));
                out
            }
            MotionCommand::WriteLiveParameter { upid, value, ty } => {
                let mut out = upid.to_le_bytes().to_vec();
                out.extend(match ty {
                    ParamType::Sint16 => (*value as i16).to_le_bytes().to_vec(),
                    ParamType::Uint16 => (*value as u16).to_le_bytes().to_vec(),
                    ParamType::Sint32 => (*value as i32).to_le_bytes().to_vec(),
                    ParamType::Uint32 => (*value as u32).to_le_bytes().to_vec(),
                });
                out
            }
            MotionCommand::AccVaiInfinitePositive { velocity, acceleration }
            | MotionCommand::AccVaiInfiniteNegative { velocity, acceleration } => {
                let mut out = schema::VELOCITY.encode(*velocity);
                out.extend(schema::ACCELERATION.encode(*acceleration));
                out
            }
            MotionCommand::VaiStop { deceleration } => schema::DECELERATION.encode(*deceleration),
        }
    }

    /// The 16-bit motion-command header: `count[3:0] | sub_id[7:4] | master_id[15:8]`.
    pub fn header(&self, mc_count: u8) -> u16 {
        (mc_count & 0x0F) as u16 | ((self.sub_id() as u16) << 4) | ((self.master_id() as u16) << 8)
    }

    /// Header followed by payload, little-endian.
    pub fn encode(&self, mc_count: u8) -> Vec<u8> {
        let mut out = self.header(mc_count).to_le_bytes().to_vec();
        out.extend(self.payload());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vai_go_to_pos_header_bits() {
        let cmd = MotionCommand::VaiGoToPos {
            position: 0.05,
            max_velocity: 0.1,
            acceleration: 10.0,
            deceleration: 10.0,
        };
        assert_eq!(cmd.header(3), 0x0103);
    }

    #[test]
    fn vai_go_to_pos_payload_conversion() {
        let cmd = MotionCommand::VaiGoToPos {
            position: 0.05,
            max_velocity: 0.1,
            acceleration: 10.0,
            deceleration: 10.0,
        };
        let payload = cmd.payload();
        assert_eq!(&payload[0..4], &500_000i32.to_le_bytes());
        assert_eq!(&payload[4..8], &100_000u32.to_le_bytes());
        assert_eq!(&payload[8..12], &1_000_000u32.to_le_bytes());
        assert_eq!(&payload[12..16], &1_000_000u32.to_le_bytes());
    }

    #[test]
    fn stop_streaming_has_empty_payload() {
        assert!(MotionCommand::StopStreaming.payload().is_empty());
    }

    #[test]
    fn write_live_parameter_packs_upid_then_value() {
        let cmd = MotionCommand::WriteLiveParameter {
            upid: 0x1234,
            value: -7,
            ty: ParamType::Sint16,
        };
        let payload = cmd.payload();
        assert_eq!(&payload[0..2], &0x1234u16.to_le_bytes());
        assert_eq!(&payload[2..4], &(-7i16).to_le_bytes());
    }
}
