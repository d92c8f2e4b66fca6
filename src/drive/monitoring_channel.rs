//! Decoding of the 16-byte raw `monitoring_channel` response field against
//! a drive's four configured [`CommandParameter`] slots.

use std::collections::HashMap;

use crate::codec::CommandParameter;

/// Decode the raw monitoring-channel bytes into a map keyed by each
/// configured slot's description. Unconfigured slots consume their default
/// 4-byte width and contribute nothing to the map.
pub fn decode(raw: &[u8; 16], slots: &[Option<CommandParameter>; 4]) -> HashMap<&'static str, f64> {
    let mut out = HashMap::new();
    let mut cursor = 0usize;

    for slot in slots {
        let width = slot.map(|p| p.ty.byte_len()).unwrap_or(4);
        if let Some(param) = slot {
            out.insert(param.description, param.decode(&raw[cursor..cursor + width]));
        }
        cursor += width;
    }

    out
}
