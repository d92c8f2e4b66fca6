//! Decoding of the 16-bit `warn_word` response field into named warnings.

/// One active warning, decoded from a single set bit of the warn word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningEntry {
    pub bit: u8,
    pub name: &'static str,
    pub meaning: &'static str,
}

const TABLE: &[(u8, &str, &str)] = &[
    (0, "Motor hot sensor", "Motor temperature sensor indicates overtemperature."),
    (
        1,
        "Motor short time overload I^2t",
        "Short-term I^2t thermal model limit reached.",
    ),
    (
        2,
        "Motor long time overload I^2t",
        "Long-term I^2t thermal model limit reached.",
    ),
    (3, "Drive overtemperature", "Drive heatsink temperature is too high."),
    (4, "Undervoltage", "DC bus voltage is below the configured threshold."),
    (6, "Overvoltage", "DC bus voltage is above the configured threshold."),
    (
        7,
        "Motor not homed",
        "The drive has not completed a homing procedure since power-up.",
    ),
    (
        8,
        "Target position out of range",
        "Commanded target position exceeds the configured travel limits.",
    ),
    (
        9,
        "Positive end-of-stroke warning",
        "Actual position is approaching the positive travel limit.",
    ),
    (
        10,
        "Negative end-of-stroke warning",
        "Actual position is approaching the negative travel limit.",
    ),
    (
        11,
        "Encoder signal quality low",
        "Position feedback signal amplitude is degraded.",
    ),
    (12, "Brake active", "The holding brake is currently engaged."),
    (
        14,
        "Communication watchdog",
        "The realtime communication watchdog is close to expiry.",
    ),
    (15, "General warning", "An unclassified warning condition is active."),
];

/// Decode a warn word into one entry per set, defined bit.
pub fn decode(mask: u16) -> Vec<WarningEntry> {
    TABLE
        .iter()
        .filter(|(bit, _, _)| mask & (1 << bit) != 0)
        .map(|&(bit, name, meaning)| WarningEntry { bit, name, meaning })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_two_warnings() {
        let entries = decode(0x0081);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Motor hot sensor");
        assert_eq!(entries[1].name, "Motor not homed");
    }

    #[test]
    fn empty_mask_yields_no_warnings() {
        assert!(decode(0).is_empty());
    }

    #[test]
    fn undefined_bits_are_ignored() {
        // Bits 5 and 13 are not defined by the table.
        assert!(decode(0b0010_0000_0010_0000).is_empty());
    }
}
