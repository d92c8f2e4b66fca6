//! The 16-bit control word used to drive the main state machine.

use bitflags::bitflags;

bitflags! {
    /// A 16-bit mask over the drive's control bits. All bits not listed
    /// here are always zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlWord: u16 {
        const SWITCH_ON = 1 << 0;
        const GO_TO_POSITION = 1 << 6;
        const ERROR_ACKNOWLEDGE = 1 << 7;
        const JOG_POSITIVE = 1 << 8;
        const JOG_NEGATIVE = 1 << 9;
        const SPECIAL_MODE = 1 << 10;
        const HOME = 1 << 11;
        const CLEARANCE_CHECK = 1 << 12;
        const GO_TO_INITIAL = 1 << 13;
        const LINEARIZING = 1 << 14;
        const PHASE_SEARCH = 1 << 15;
    }
}

impl ControlWord {
    /// Little-endian wire encoding.
    pub fn encode(self) -> [u8; 2] {
        self.bits().to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_sequence_bits() {
        let cw = ControlWord::SWITCH_ON | ControlWord::HOME;
        assert_eq!(cw.bits(), 0b0000_1000_0000_0001);
        assert_eq!(cw.encode(), [0x01, 0x08]);
    }

    #[test]
    fn zero_word_switches_off() {
        assert_eq!(ControlWord::empty().encode(), [0x00, 0x00]);
    }
}
