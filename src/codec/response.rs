//! Response decoding: the fixed-order field layout that mirrors
//! `response_def`, plus the realtime-config tail that rides along whenever
//! the originating request carried one.

use crate::error::CodecError;

use super::realtime_config::{RealtimeConfig, RealtimeConfigResponse};
use super::request::{RequestDescriptor, ResponseDescriptor};
use super::state_var::StateVar;
use super::warn_word::{self, WarningEntry};

/// The decoded response, with nullable fields matching the descriptor that
/// produced it (plus `realtime_config` whenever one was sent).
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedResponse {
    pub request_descriptor: RequestDescriptor,
    pub response_descriptor: ResponseDescriptor,
    pub status_word: Option<u16>,
    pub state_var: Option<StateVar>,
    pub actual_pos: Option<f64>,
    pub demand_pos: Option<f64>,
    pub current: Option<f64>,
    pub warnings: Option<Vec<WarningEntry>>,
    pub error_code: Option<u16>,
    pub monitoring_channel: Option<[u8; 16]>,
    pub realtime_config: Option<RealtimeConfigResponse>,
}

const POSITION_SCALE: f64 = 1e7;
const CURRENT_SCALE: f64 = 1e3;

/// Decode a full datagram. `sent_realtime_config` is the command that was
/// issued in the originating request, needed to interpret the realtime-config
/// tail's output-parameter width and engineering-unit scale; pass `None` if
/// the request carried no realtime-config block.
pub fn decode(bytes: &[u8], sent_realtime_config: Option<&RealtimeConfig>) -> Result<TranslatedResponse, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::LengthMismatch {
            expected_at_least: 8,
            got: bytes.len(),
        });
    }

    let request_descriptor =
        RequestDescriptor::from_bits_truncate(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
    let response_descriptor =
        ResponseDescriptor::from_bits_truncate(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]));

    let mut out = TranslatedResponse {
        request_descriptor,
        response_descriptor,
        status_word: None,
        state_var: None,
        actual_pos: None,
        demand_pos: None,
        current: None,
        warnings: None,
        error_code: None,
        monitoring_channel: None,
        realtime_config: None,
    };

    let mut cursor = 8usize;
    let mut take = |len: usize| -> Result<&[u8], CodecError> {
        let end = cursor + len;
        if end > bytes.len() {
            return Err(CodecError::LengthMismatch {
                expected_at_least: end,
                got: bytes.len(),
            });
        }
        let slice = &bytes[cursor..end];
        cursor = end;
        Ok(slice)
    };

    if response_descriptor.contains(ResponseDescriptor::STATUS_WORD) {
        let b = take(2)?;
        out.status_word = Some(u16::from_le_bytes([b[0], b[1]]));
    }
    if response_descriptor.contains(ResponseDescriptor::STATE_VAR) {
        let b = take(2)?;
        out.state_var = Some(StateVar::decode(b[0], b[1]));
    }
    if response_descriptor.contains(ResponseDescriptor::ACTUAL_POS) {
        let b = take(4)?;
        out.actual_pos = Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64 / POSITION_SCALE);
    }
    if response_descriptor.contains(ResponseDescriptor::DEMAND_POS) {
        let b = take(4)?;
        out.demand_pos = Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64 / POSITION_SCALE);
    }
    if response_descriptor.contains(ResponseDescriptor::CURRENT) {
        let b = take(2)?;
        out.current = Some(i16::from_le_bytes([b[0], b[1]]) as f64 / CURRENT_SCALE);
    }
    if response_descriptor.contains(ResponseDescriptor::WARN_WORD) {
        let b = take(2)?;
        out.warnings = Some(warn_word::decode(u16::from_le_bytes([b[0], b[1]])));
    }
    if response_descriptor.contains(ResponseDescriptor::ERROR_CODE) {
        let b = take(2)?;
        out.error_code = Some(u16::from_le_bytes([b[0], b[1]]));
    }
    if response_descriptor.contains(ResponseDescriptor::MONITORING_CHANNEL) {
        let b = take(16)?;
        let mut channel = [0u8; 16];
        channel.copy_from_slice(b);
        out.monitoring_channel = Some(channel);
    }

    // Present whenever the request carried a realtime_config block, even if
    // the response descriptor did not request it.
    if let Some(rc) = sent_realtime_config {
        let header_bytes = take(2)?;
        let header = u16::from_le_bytes([header_bytes[0], header_bytes[1]]);
        let body = take(rc.response_len() - 2)?;
        out.realtime_config = Some(rc.decode_response(header, body));
    }

    Ok(out)
}
