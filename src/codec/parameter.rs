//! Shared parameter schema, reused by motion commands, realtime-config
//! payloads, and monitoring-channel decoding.
//!
//! Descriptors are immutable. Several revisions of the system this crate
//! models mutated a single shared descriptor object in place to carry a
//! value alongside it; that is a latent bug once the same descriptor is
//! reused from two call sites concurrently. Here a descriptor and its
//! current value are always kept apart: [`CommandParameter::encode`] and
//! [`CommandParameter::decode`] are pure functions over `&self`.

/// Wire integer representation of a [`CommandParameter`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Sint16,
    Uint16,
    Sint32,
    Uint32,
}

impl ParamType {
    /// Width of this type on the wire, in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            ParamType::Sint16 | ParamType::Uint16 => 2,
            ParamType::Sint32 | ParamType::Uint32 => 4,
        }
    }

    fn pack(self, raw: i64) -> Vec<u8> {
        match self {
            ParamType::Sint16 => (raw as i16).to_le_bytes().to_vec(),
            ParamType::Uint16 => (raw as u16).to_le_bytes().to_vec(),
            ParamType::Sint32 => (raw as i32).to_le_bytes().to_vec(),
            ParamType::Uint32 => (raw as u32).to_le_bytes().to_vec(),
        }
    }

    fn unpack(self, bytes: &[u8]) -> i64 {
        match self {
            ParamType::Sint16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
            ParamType::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as i64,
            ParamType::Sint32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            ParamType::Uint32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        }
    }
}

/// An immutable schema entry: a physical unit, a scalar engineering-unit to
/// raw-integer conversion factor, and the wire integer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandParameter {
    pub description: &'static str,
    pub unit: &'static str,
    pub conversion_factor: f64,
    pub ty: ParamType,
}

impl CommandParameter {
    pub const fn new(
        description: &'static str,
        unit: &'static str,
        conversion_factor: f64,
        ty: ParamType,
    ) -> Self {
        Self {
            description,
            unit,
            conversion_factor,
            ty,
        }
    }

    /// Engineering value -> raw little-endian wire bytes.
    ///
    /// `raw = round(value * conversion_factor)`.
    pub fn encode(&self, value: f64) -> Vec<u8> {
        let raw = (value * self.conversion_factor).round() as i64;
        self.ty.pack(raw)
    }

    /// Raw little-endian wire bytes -> engineering value.
    ///
    /// `value = raw / conversion_factor`. Panics if `bytes` is shorter than
    /// [`ParamType::byte_len`]; callers are expected to have already
    /// validated the response length against the response descriptor.
    pub fn decode(&self, bytes: &[u8]) -> f64 {
        self.ty.unpack(bytes) as f64 / self.conversion_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_signed_position() {
        let p = CommandParameter::new("pos", "m", 1e7, ParamType::Sint32);
        let bytes = p.encode(0.125);
        assert_eq!(p.decode(&bytes), 0.125);
    }

    #[test]
    fn round_trips_unsigned_velocity() {
        let p = CommandParameter::new("vel", "m/s", 1e6, ParamType::Uint32);
        let bytes = p.encode(0.1);
        assert_eq!(bytes, 100_000u32.to_le_bytes());
        assert_eq!(p.decode(&bytes), 0.1);
    }

    #[test]
    fn byte_len_matches_type() {
        assert_eq!(ParamType::Sint16.byte_len(), 2);
        assert_eq!(ParamType::Uint16.byte_len(), 2);
        assert_eq!(ParamType::Sint32.byte_len(), 4);
        assert_eq!(ParamType::Uint32.byte_len(), 4);
    }
}
