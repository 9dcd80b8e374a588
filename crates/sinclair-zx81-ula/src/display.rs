//! Display snapshots.
//!
//! # Display file
//!
//! The ZX81 keeps its screen as character codes. The system variable
//! `D_FILE` ($400C) points at the display file: a `HALT` ($76), then 24
//! lines of up to 32 codes each terminated by another `HALT`. A collapsed
//! display file (1K machines) has short or empty lines.

use crate::chroma::Chroma81;

/// `D_FILE` system variable.
pub const D_FILE: u16 = 0x400C;
/// Line terminator in the display file.
pub const HALT: u8 = 0x76;

pub const CHAR_COLUMNS: usize = 32;
pub const CHAR_ROWS: usize = 24;
/// Pixel snapshot: 256 pixels (32 bytes) by 192 lines.
pub const PIXEL_ROW_BYTES: usize = 32;
pub const PIXEL_ROWS: usize = 192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// 1 bpp bitmap captured from the display fetches, MSB leftmost.
    Pixels,
    /// Character codes from the display file, one byte per cell.
    Characters,
}

/// What the screen looks like right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub kind: DisplayKind,
    /// Bytes per row.
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
    /// One Chroma81 colour byte per `data` byte when colour is enabled.
    pub colours: Option<Vec<u8>>,
    /// Chroma81 border colour when colour is enabled.
    pub border: Option<u8>,
}

impl DisplaySnapshot {
    /// Capture the character grid from the display file.
    ///
    /// Lines shorter than 32 characters are padded with spaces (code 0).
    #[must_use]
    pub fn from_display_file(memory: &dyn Fn(u16) -> u8, chroma: &Chroma81) -> Self {
        let mut data = vec![0u8; CHAR_COLUMNS * CHAR_ROWS];
        let mut colours = chroma
            .enabled
            .then(|| vec![0u8; CHAR_COLUMNS * CHAR_ROWS]);

        let dfile = u16::from(memory(D_FILE)) | (u16::from(memory(D_FILE + 1)) << 8);
        // Skip the leading HALT.
        let mut addr = dfile.wrapping_add(1);

        for row in 0..CHAR_ROWS {
            // 32 characters plus the terminator; a corrupt file without a
            // HALT just moves on to the next row.
            for col in 0..=CHAR_COLUMNS {
                let code = memory(addr);
                let cell_addr = addr;
                addr = addr.wrapping_add(1);
                if code == HALT {
                    break;
                }
                if col < CHAR_COLUMNS {
                    let index = row * CHAR_COLUMNS + col;
                    data[index] = code;
                    if let Some(colours) = colours.as_mut() {
                        colours[index] = chroma.colour(code, cell_addr, 0, memory);
                    }
                }
            }
        }

        Self {
            kind: DisplayKind::Characters,
            width: CHAR_COLUMNS,
            height: CHAR_ROWS,
            data,
            colours,
            border: chroma.enabled.then_some(chroma.border),
        }
    }
}
