//! Chroma81 colour interface.
//!
//! One I/O port, `$7FEF`. Writes: bit 5 enables colour, bit 4 picks the
//! mode, bits 3-0 are the border colour. Reads return a fixed pattern with
//! bit 0 low to say the interface is present.
//!
//! Colour sources:
//! - character-code mode: a 2K table at `$C000`, eight bytes per character
//!   code (one per pixel row)
//! - attribute mode: a plane parallel to the display file, `$8000` above it

use emu_core::{SnapshotError, SnapshotReader, SnapshotWriter};

pub const CHROMA_PORT: u16 = 0x7FEF;
/// Value read back from `CHROMA_PORT`.
pub const CHROMA_PRESENT: u8 = 0b1111_1110;

const CHARACTER_COLOUR_TABLE: u16 = 0xC000;
const ATTRIBUTE_PLANE_OFFSET: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourMode {
    CharacterCode,
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chroma81 {
    pub enabled: bool,
    pub mode: ColourMode,
    pub border: u8,
}

impl Chroma81 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: false,
            mode: ColourMode::CharacterCode,
            border: 0,
        }
    }

    pub fn write(&mut self, value: u8) {
        self.enabled = value & 0x20 != 0;
        self.mode = if value & 0x10 != 0 {
            ColourMode::Attribute
        } else {
            ColourMode::CharacterCode
        };
        self.border = value & 0x0F;
        log::debug!(
            "Chroma81: enabled={} mode={:?} border={}",
            self.enabled,
            self.mode,
            self.border
        );
    }

    /// Colour byte (ink low nibble, paper high nibble) for one character
    /// row. `dfile_address` is where the character code sits in the display
    /// file (A15 clear).
    #[must_use]
    pub fn colour(
        &self,
        code: u8,
        dfile_address: u16,
        sub_line: u8,
        memory: &dyn Fn(u16) -> u8,
    ) -> u8 {
        match self.mode {
            ColourMode::CharacterCode => memory(
                CHARACTER_COLOUR_TABLE | (u16::from(code) << 3) | u16::from(sub_line & 0x07),
            ),
            ColourMode::Attribute => memory(dfile_address.wrapping_add(ATTRIBUTE_PLANE_OFFSET)),
        }
    }

    pub(crate) fn save(&self, w: &mut SnapshotWriter) {
        w.write_bool(self.enabled);
        w.write_bool(self.mode == ColourMode::Attribute);
        w.write_u8(self.border);
    }

    pub(crate) fn load(r: &mut SnapshotReader<'_>) -> Result<Self, SnapshotError> {
        Ok(Self {
            enabled: r.read_bool()?,
            mode: if r.read_bool()? {
                ColourMode::Attribute
            } else {
                ColourMode::CharacterCode
            },
            border: r.read_u8()? & 0x0F,
        })
    }
}

impl Default for Chroma81 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_byte_decodes() {
        let mut chroma = Chroma81::new();
        chroma.write(0b0011_0101);
        assert!(chroma.enabled);
        assert_eq!(chroma.mode, ColourMode::Attribute);
        assert_eq!(chroma.border, 5);

        chroma.write(0b0000_1111);
        assert!(!chroma.enabled);
        assert_eq!(chroma.mode, ColourMode::CharacterCode);
        assert_eq!(chroma.border, 15);
    }

    #[test]
    fn character_mode_indexes_colour_table() {
        let chroma = Chroma81 {
            enabled: true,
            mode: ColourMode::CharacterCode,
            border: 0,
        };
        let memory = |addr: u16| if addr == 0xC000 + 0x26 * 8 + 3 { 0x71 } else { 0 };
        assert_eq!(chroma.colour(0x26, 0x4100, 3, &memory), 0x71);
    }

    #[test]
    fn attribute_mode_reads_parallel_plane() {
        let chroma = Chroma81 {
            enabled: true,
            mode: ColourMode::Attribute,
            border: 0,
        };
        let memory = |addr: u16| if addr == 0xC100 { 0x42 } else { 0 };
        assert_eq!(chroma.colour(0x26, 0x4100, 3, &memory), 0x42);
    }
}
