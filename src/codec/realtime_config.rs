//! Realtime-config payloads: out-of-band access to drive parameters,
//! variables, curves, logs, and command tables, correlated by its own
//! 4-bit rolling counter separate from the motion-command counter.

use super::parameter::ParamType;

/// A realtime-config command.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeConfig {
    Noop,
    /// Read a RAM-resident parameter by UPID.
    ReadRamByUpid {
        upid: u16,
        expected_type: ParamType,
        unit: &'static str,
        conversion_factor: f64,
    },
    /// Read a ROM-resident parameter by UPID. Reserved: present on the wire
    /// but not exercised by any [`crate::drive::Drive`] operation in this
    /// crate.
    ReadRomByUpid {
        upid: u16,
        expected_type: ParamType,
        unit: &'static str,
        conversion_factor: f64,
    },
}

/// The decoded realtime-config response.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfigResponse {
    pub status_number: u8,
    pub status_description: &'static str,
    pub command_count: u8,
    /// `[echoed UPID, decoded engineering value]` for `ReadRamByUpid`/
    /// `ReadRomByUpid`; empty for `Noop`.
    pub values: Vec<f64>,
}

/// Resolve a raw status byte to its documented meaning.
pub fn status_description(status: u8) -> &'static str {
    match status {
        0x00 => "OK",
        0x02 => "Command running / busy",
        0x04 => "Block not finished",
        0x05 => "Busy",
        0xC0 => "UPID error",
        0xC1 => "Parameter-type error",
        0xC2 => "Range error",
        0xC3 => "Address-usage error",
        0xC5 => "Sequence error for UPID list",
        0xC6 => "End of UPID list",
        0xD0 => "Odd address",
        0xD1 => "Size error",
        0xD4 => "Curve already defined / missing",
        _ => "UNKNOWN",
    }
}

impl RealtimeConfig {
    pub fn command_id(&self) -> u8 {
        match self {
            RealtimeConfig::Noop => 0x00,
            RealtimeConfig::ReadRomByUpid { .. } => 0x10,
            RealtimeConfig::ReadRamByUpid { .. } => 0x11,
        }
    }

    fn upid_and_type(&self) -> Option<(u16, ParamType)> {
        match *self {
            RealtimeConfig::Noop => None,
            RealtimeConfig::ReadRamByUpid { upid, expected_type, .. }
            | RealtimeConfig::ReadRomByUpid { upid, expected_type, .. } => Some((upid, expected_type)),
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self.upid_and_type() {
            None => Vec::new(),
            Some((upid, _)) => upid.to_le_bytes().to_vec(),
        }
    }

    /// The 16-bit realtime-config header: `count[3:0] | reserved[7:4] | command_id[15:8]`.
    pub fn header(&self, rt_count: u8) -> u16 {
        (rt_count & 0x0F) as u16 | ((self.command_id() as u16) << 8)
    }

    pub fn encode(&self, rt_count: u8) -> Vec<u8> {
        let mut out = self.header(rt_count).to_le_bytes().to_vec();
        out.extend(self.payload());
        out
    }

    /// Total on-wire response length for this command: 2-byte header plus
    /// the declared output-parameter widths.
    pub fn response_len(&self) -> usize {
        match self.upid_and_type() {
            None => 2,
            Some((_, ty)) => 2 + 2 + ty.byte_len(),
        }
    }

    /// Decode a response whose header (2 bytes) has already been split from
    /// `body`.
    pub fn decode_response(&self, header: u16, body: &[u8]) -> RealtimeConfigResponse {
        let command_count = (header & 0x0F) as u8;
        let status_number = (header >> 8) as u8;

        let values = match self {
            RealtimeConfig::Noop => Vec::new(),
            RealtimeConfig::ReadRamByUpid { conversion_factor, expected_type, .. }
            | RealtimeConfig::ReadRomByUpid { conversion_factor, expected_type, .. } => {
                let echoed_upid = u16::from_le_bytes([body[0], body[1]]) as f64;
                let raw_bytes = &body[2..2 + expected_type.byte_len()];
                let raw = match expected_type {
                    ParamType::Sint16 => i16::from_le_bytes([raw_bytes[0], raw_bytes[1]]) as i64,
                    ParamType::Uint16 => u16::from_le_bytes([raw_bytes[0], raw_bytes[1]]) as i64,
                    ParamType::Sint32 => {
                        i32::from_le_bytes([raw_bytes[0], raw_bytes[1], raw_bytes[2], raw_bytes[3]]) as i64
                    }
                    ParamType::Uint32 => {
                        u32::from_le_bytes([raw_bytes[0], raw_bytes[1], raw_bytes[2], raw_bytes[3]]) as i64
                    }
                };
                vec![echoed_upid, raw as f64 / conversion_factor]
            }
        };

        RealtimeConfigResponse {
            status_number,
            status_description: status_description(status_number),
            command_count,
            values,
        }
    }
}
