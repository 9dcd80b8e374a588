//! ULA timing configuration.

use emu_core::MasterClock;

/// ZX81 CPU clock (3.25 MHz).
pub const ZX81_CPU_HZ: u64 = 3_250_000;

/// Timing thresholds, all in CPU T-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UlaConfig {
    pub cpu_frequency_hz: u64,
    /// Nominal frame rate (50 for PAL, 60 for NTSC).
    pub frames_per_second: u64,
    pub tstates_per_line: u32,
    /// HSYNC low pulse width at the end of each line.
    pub hsync_low_tstates: u32,
    /// VSYNC pulses shorter than this are noise, not a frame.
    pub vsync_min_tstates: u32,
    /// Chroma81 colour interface fitted.
    pub chroma81: bool,
}

impl UlaConfig {
    /// T-states in one nominal frame.
    #[must_use]
    pub fn frame_tstates(&self) -> u64 {
        MasterClock::new(self.cpu_frequency_hz).tstates_per_frame(self.frames_per_second.max(1))
    }
}

impl Default for UlaConfig {
    fn default() -> Self {
        Self {
            cpu_frequency_hz: ZX81_CPU_HZ,
            frames_per_second: 50,
            tstates_per_line: 207,
            hsync_low_tstates: 16,
            vsync_min_tstates: 400,
            chroma81: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pal_frame_is_65000_tstates() {
        assert_eq!(UlaConfig::default().frame_tstates(), 65_000);
    }

    #[test]
    fn ntsc_frame() {
        let config = UlaConfig {
            frames_per_second: 60,
            ..UlaConfig::default()
        };
        assert_eq!(config.frame_tstates(), 54_166);
    }
}
