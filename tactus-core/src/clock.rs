//! Clock source policy
//!
//! Tracks which clock source the sequencer timing base follows and
//! the current target frequency. The actual frequency synthesis and
//! external-pin sync live in the HAL; this is the mode bookkeeping
//! consulted by the status command and the fault-recovery hook.

/// Calibrated internal default frequency in Hz
pub const INTERNAL_DEFAULT_HZ: u32 = 100_000_000;

/// Active clock source.
///
/// Discriminants are the wire codes reported by the status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockMode {
    /// Internal PLL at the configured frequency
    Internal = 0,
    /// Locked to a reference on the external sync pin
    External = 1,
}

impl ClockMode {
    /// Numeric code for the status report
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a stored mode byte, defaulting to internal
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ClockMode::External,
            _ => ClockMode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes_roundtrip() {
        assert_eq!(ClockMode::Internal.code(), 0);
        assert_eq!(ClockMode::External.code(), 1);
        assert_eq!(ClockMode::from_code(0), ClockMode::Internal);
        assert_eq!(ClockMode::from_code(1), ClockMode::External);
        // Anything unexpected falls back to internal, the safe source
        assert_eq!(ClockMode::from_code(7), ClockMode::Internal);
    }
}
