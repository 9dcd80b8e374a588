//! Master clock configuration.

/// Master clock configuration for a system.
///
/// The ZX81 has no separate crystal divider model here: the clock runs at
/// the CPU rate and everything is counted in T-states.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MasterClock {
    /// CPU frequency in Hz (e.g., `3_250_000` for the ZX81).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// T-states per frame at the given frame rate (integer division).
    #[must_use]
    pub const fn tstates_per_frame(&self, frames_per_second: u64) -> u64 {
        self.frequency_hz / frames_per_second
    }

    /// Elapsed time for a T-state count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seconds(&self, tstates: u64) -> f64 {
        tstates as f64 / self.frequency_hz as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zx81_frame_length() {
        let clock = MasterClock::new(3_250_000);
        assert_eq!(clock.tstates_per_frame(50), 65_000);
        assert!((clock.seconds(65_000) - 0.02).abs() < 1e-12);
    }
}
