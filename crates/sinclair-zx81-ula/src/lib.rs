//! Sinclair ZX81 ULA.
//!
//! The ZX81 has no video RAM and no frame timer. The CPU generates the
//! picture itself: the ROM jumps into the display file with A15 set, and the
//! ULA watches every opcode fetch in that range, turns display characters
//! into NOPs and shifts their pixels out. Line and frame timing come from
//! the NMI generator (HSYNC), from `IN`/`OUT` on the ULA port (VSYNC) and
//! from the CPU's refresh register (INT when R bit 6 falls).
//!
//! # Variants
//!
//! Both implement [`Zx81Video`]:
//!
//! - [`FrameUla`]: logical frame buffer. Every nominal frame it raises INT
//!   and copies the display file. Cheap, but software that builds its own
//!   display (hi-res, pseudo hi-res) shows nothing useful.
//! - [`BusUla`]: bus-accurate. Tracks HSYNC/VSYNC, NMI and INT generation
//!   and renders pixels from intercepted opcode fetches.
//!
//! # Timing (PAL)
//!
//! - 3.25 MHz CPU, 207 T-states per line, HSYNC low for the last 16
//! - 65,000 T-states per nominal frame (50 Hz)
//! - VSYNC shorter than 400 T-states is ignored
//!
//! # Driving
//!
//! Call [`Zx81Video::execute`] after every CPU instruction with the T-states
//! it took. Route opcode fetches through [`Zx81Video::fetch_opcode`] and
//! every port access through `io_read`/`io_write`. Drain notifications with
//! [`Zx81Video::take_events`].

#![allow(clippy::cast_possible_truncation)]

mod bus_ula;
mod chroma;
mod config;
mod display;
mod frame;

pub use bus_ula::BusUla;
pub use chroma::{CHROMA_PORT, CHROMA_PRESENT, Chroma81, ColourMode};
pub use config::{UlaConfig, ZX81_CPU_HZ};
pub use display::{
    CHAR_COLUMNS, CHAR_ROWS, D_FILE, DisplayKind, DisplaySnapshot, HALT, PIXEL_ROW_BYTES,
    PIXEL_ROWS,
};
pub use frame::FrameUla;

use emu_core::{InterruptSink, Observable, SaveState};

/// Value the ULA leaves on the data bus during an interrupt acknowledge.
pub const INT_DATA_BUS: u8 = 0xFF;
/// Opcode substituted for intercepted display bytes.
pub const NOP: u8 = 0x00;

/// Notifications for the host (frontend, debugger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEvent {
    /// A complete frame is ready for `display_snapshot()`.
    FrameReady,
    /// No genuine VSYNC for two frames: the TV would lose sync.
    NoDisplay,
}

/// Which implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VideoVariant {
    Frame,
    #[default]
    Bus,
}

impl VideoVariant {
    /// Snapshot tag.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Frame => 0,
            Self::Bus => 1,
        }
    }

    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Frame),
            1 => Some(Self::Bus),
            _ => None,
        }
    }

    /// Build a fresh ULA of this variant.
    #[must_use]
    pub fn build(self, config: UlaConfig) -> Box<dyn Zx81Video> {
        match self {
            Self::Frame => Box::new(FrameUla::new(config)),
            Self::Bus => Box::new(BusUla::new(config)),
        }
    }
}

/// Video timing generator interface shared by both variants.
///
/// `memory` closures read without side effects (like `Bus::peek`).
pub trait Zx81Video: SaveState + Observable {
    /// Advance by the T-states the last instruction (plus any DMA) took.
    ///
    /// `refresh` and `vector` are the CPU's R and I registers after the
    /// instruction.
    fn execute(
        &mut self,
        cycles: u32,
        refresh: u8,
        vector: u8,
        memory: &dyn Fn(u16) -> u8,
        irq: &mut dyn InterruptSink,
    );

    /// Filter an opcode fetch. Returns the byte the CPU actually sees.
    fn fetch_opcode(&mut self, _address: u16, value: u8, _memory: &dyn Fn(u16) -> u8) -> u8 {
        value
    }

    /// Observe a port read. `Some` if the ULA drives the data bus.
    fn io_read(&mut self, port: u16) -> Option<u8>;

    /// Observe a port write.
    fn io_write(&mut self, port: u16, value: u8);

    /// Current picture.
    fn display_snapshot(&self, memory: &dyn Fn(u16) -> u8) -> DisplaySnapshot;

    /// Drain pending notifications.
    fn take_events(&mut self) -> Vec<VideoEvent>;

    fn variant(&self) -> VideoVariant;
}

/// NMI generator port decode: `OUT ($FE)` (A0 low) switches it on,
/// `OUT ($FD)` (A1 low) switches it off. Returns the new state.
pub(crate) fn nmi_generator_write(port: u16, current: bool) -> bool {
    if port & 0x0001 == 0 {
        true
    } else if port & 0x0002 == 0 {
        false
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nmi_generator_port_decode() {
        assert!(nmi_generator_write(0x00FE, false));
        assert!(!nmi_generator_write(0x00FD, true));
        assert!(nmi_generator_write(CHROMA_PORT, true));
        assert!(!nmi_generator_write(CHROMA_PORT, false));
    }

    #[test]
    fn variant_tags_round_trip() {
        for variant in [VideoVariant::Frame, VideoVariant::Bus] {
            assert_eq!(VideoVariant::from_tag(variant.tag()), Some(variant));
            assert_eq!(variant.build(UlaConfig::default()).variant(), variant);
        }
        assert_eq!(VideoVariant::from_tag(9), None);
    }
}
