//! Request framing: the `request_def`/`response_def` preludes plus the
//! optional control-word, motion-command, and realtime-config blocks.

use bitflags::bitflags;

use super::control_word::ControlWord;
use super::motion_command::MotionCommand;
use super::realtime_config::RealtimeConfig;

bitflags! {
    /// `request_def`: which optional blocks are present on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RequestDescriptor: u32 {
        const CONTROL_WORD = 1 << 0;
        const MOTION_COMMAND = 1 << 1;
        const REALTIME_CONFIG = 1 << 2;
    }
}

bitflags! {
    /// `response_def`: which fields the drive should populate in its reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResponseDescriptor: u32 {
        const STATUS_WORD = 1 << 0;
        const STATE_VAR = 1 << 1;
        const ACTUAL_POS = 1 << 2;
        const DEMAND_POS = 1 << 3;
        const CURRENT = 1 << 4;
        const WARN_WORD = 1 << 5;
        const ERROR_CODE = 1 << 6;
        const MONITORING_CHANNEL = 1 << 7;
        const REALTIME_CONFIG = 1 << 8;
    }
}

/// An immutable, fully-formed request. Built once per send via the
/// constructors below; never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub response: ResponseDescriptor,
    pub control_word: Option<ControlWord>,
    pub motion_command: Option<MotionCommand>,
    pub realtime_config: Option<RealtimeConfig>,
    pub log_level: log::Level,
}

/// Minimum request length on the wire: two 4-byte def-words plus at least
/// six bytes of padding, per the protocol's framing floor.
const MIN_REQUEST_LEN: usize = 4 + 4 + 6;

impl Request {
    pub fn new(response: ResponseDescriptor) -> Self {
        Request {
            response,
            control_word: None,
            motion_command: None,
            realtime_config: None,
            log_level: log::Level::Debug,
        }
    }

    pub fn with_control_word(mut self, cw: ControlWord) -> Self {
        self.control_word = Some(cw);
        self
    }

    pub fn with_motion_command(mut self, mc: MotionCommand) -> Self {
        self.motion_command = Some(mc);
        self
    }

    pub fn with_realtime_config(mut self, rc: RealtimeConfig) -> Self {
        self.realtime_config = Some(rc);
        self
    }

    pub fn with_log_level(mut self, level: log::Level) -> Self {
        self.log_level = level;
        self
    }

    fn request_descriptor(&self) -> RequestDescriptor {
        let mut def = RequestDescriptor::empty();
        if self.control_word.is_some() {
            def |= RequestDescriptor::CONTROL_WORD;
        }
        if self.motion_command.is_some() {
            def |= RequestDescriptor::MOTION_COMMAND;
        }
        if self.realtime_config.is_some() {
            def |= RequestDescriptor::REALTIME_CONFIG;
        }
        def
    }

    /// Encode to wire bytes, given the counters to stamp into the optional
    /// motion-command and realtime-config headers.
    pub fn encode(&self, mc_count: u8, rt_count: u8) -> Vec<u8> {
        let mut out = self.request_descriptor().bits().to_le_bytes().to_vec();
        out.extend(self.response.bits().to_le_bytes());

        if let Some(cw) = self.control_word {
            out.extend(cw.encode());
        }
        if let Some(mc) = &self.motion_command {
            out.extend(mc.encode(mc_count));
        }
        if let Some(rc) = &self.realtime_config {
            out.extend(rc.encode(rt_count));
        }

        while out.len() < MIN_REQUEST_LEN {
            out.push(0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parameter::ParamType;

    #[test]
    fn bare_request_meets_minimum_length() {
        let req = Request::new(ResponseDescriptor::STATUS_WORD | ResponseDescriptor::STATE_VAR);
        assert!(req.encode(0, 0).len() >= 14);
    }

    #[test]
    fn descriptor_bits_reflect_present_blocks() {
        let req = Request::new(ResponseDescriptor::empty())
            .with_control_word(ControlWord::SWITCH_ON)
            .with_motion_command(MotionCommand::Noop);
        let bytes = req.encode(0, 0);
        let request_def = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(
            request_def,
            (RequestDescriptor::CONTROL_WORD | RequestDescriptor::MOTION_COMMAND).bits()
        );
    }

    #[test]
    fn vai_go_to_pos_e2_datagram_body() {
        let req = Request::new(ResponseDescriptor::empty()).with_motion_command(MotionCommand::VaiGoToPos {
            position: 0.05,
            max_velocity: 0.10,
            acceleration: 10.0,
            deceleration: 10.0,
        });
        let bytes = req.encode(2, 0);
        // after the two 4-byte def-words: header 0x0102 LE, then payload
        assert_eq!(&bytes[8..10], &0x0102u16.to_le_bytes());
    }

    #[test]
    fn realtime_config_present_regardless_of_response_descriptor() {
        let req = Request::new(ResponseDescriptor::empty()).with_realtime_config(RealtimeConfig::ReadRamByUpid {
            upid: 1,
            expected_type: ParamType::Uint16,
            unit: "-",
            conversion_factor: 1.0,
        });
        let bytes = req.encode(0, 5);
        let request_def = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert!(RequestDescriptor::from_bits_truncate(request_def).contains(RequestDescriptor::REALTIME_CONFIG));
    }
}
