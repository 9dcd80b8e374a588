//! Bus-accurate ULA.
//!
//! Follows the real sync generation instead of a frame timer:
//!
//! - HSYNC is derived from a line counter clocked by the T-states the CPU
//!   reports. Each line end bumps the line and sub-line counters and, with
//!   the NMI generator on, pulses NMI (the ROM counts blank lines this way).
//! - VSYNC starts on `IN` from an even port while the NMI generator is off
//!   and ends on the next `OUT`. Only pulses of at least `vsync_min_tstates`
//!   count as a frame; shorter ones just reset the sub-line counter.
//! - INT follows the refresh address: when R bit 6 falls the ULA pulls INT
//!   on the next instruction.
//!
//! Pixels come from opcode fetches above $8000: a byte with bit 6 clear is
//! a display character, the CPU sees a NOP and the ULA looks up its pattern
//! in the character set at `I * 256`.

use emu_core::{
    InterruptSink, Observable, SaveState, SnapshotError, SnapshotReader, SnapshotWriter, Value,
};

use crate::chroma::{CHROMA_PORT, CHROMA_PRESENT, Chroma81};
use crate::config::UlaConfig;
use crate::display::{DisplayKind, DisplaySnapshot, PIXEL_ROW_BYTES, PIXEL_ROWS};
use crate::{INT_DATA_BUS, NOP, VideoEvent, VideoVariant, Zx81Video, nmi_generator_write};

const FRAME_BYTES: usize = PIXEL_ROW_BYTES * PIXEL_ROWS;

/// Bus-accurate ULA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusUla {
    config: UlaConfig,
    frame_tstates: u64,

    elapsed: u64,
    /// T-states into the current line.
    line_tstate: u32,
    hsync_low: bool,
    vsync_active: bool,
    vsync_start: u64,
    /// Free-running line counter, reset by a genuine VSYNC.
    line: u16,
    /// Character row within a text line (0-7).
    sub_line: u8,

    nmi_enabled: bool,
    int_pending: bool,
    prev_refresh: u8,
    /// I register as of the last `execute`; selects the character set.
    i_register: u8,

    display_available: bool,
    since_vsync: u64,
    frames: u64,

    chroma: Chroma81,

    // Frame being drawn.
    pixels: Vec<u8>,
    colours: Vec<u8>,
    row: Option<u16>,
    row_line: u16,
    column: u8,

    // Last completed frame.
    frame_pixels: Vec<u8>,
    frame_colours: Vec<u8>,

    events: Vec<VideoEvent>,
}

impl BusUla {
    #[must_use]
    pub fn new(config: UlaConfig) -> Self {
        Self {
            frame_tstates: config.frame_tstates().max(1),
            config,
            elapsed: 0,
            line_tstate: 0,
            hsync_low: false,
            vsync_active: false,
            vsync_start: 0,
            line: 0,
            sub_line: 0,
            nmi_enabled: false,
            int_pending: false,
            prev_refresh: 0,
            i_register: 0,
            display_available: true,
            since_vsync: 0,
            frames: 0,
            chroma: Chroma81::new(),
            pixels: vec![0; FRAME_BYTES],
            colours: vec![0; FRAME_BYTES],
            row: None,
            row_line: 0,
            column: 0,
            frame_pixels: vec![0; FRAME_BYTES],
            frame_colours: vec![0; FRAME_BYTES],
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn line(&self) -> u16 {
        self.line
    }

    #[must_use]
    pub fn sub_line(&self) -> u8 {
        self.sub_line
    }

    #[must_use]
    pub fn hsync_low(&self) -> bool {
        self.hsync_low
    }

    #[must_use]
    pub fn vsync_active(&self) -> bool {
        self.vsync_active
    }

    #[must_use]
    pub fn nmi_enabled(&self) -> bool {
        self.nmi_enabled
    }

    /// False after two nominal frames without a genuine VSYNC.
    #[must_use]
    pub fn display_available(&self) -> bool {
        self.display_available
    }

    /// Genuine VSYNCs seen since power-on.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub fn chroma(&self) -> &Chroma81 {
        &self.chroma
    }

    fn end_vsync(&mut self) {
        self.vsync_active = false;
        let duration = self.elapsed.saturating_sub(self.vsync_start);

        if duration < u64::from(self.config.vsync_min_tstates) {
            log::trace!("ULA: short VSYNC ({duration} T-states) ignored");
            self.sub_line = 0;
            return;
        }

        if !self.display_available {
            log::debug!("ULA: display restored after {} T-states", self.since_vsync);
        }
        self.line = 0;
        self.sub_line = 0;
        self.display_available = true;
        self.since_vsync = 0;
        self.frames += 1;

        std::mem::swap(&mut self.pixels, &mut self.frame_pixels);
        std::mem::swap(&mut self.colours, &mut self.frame_colours);
        self.pixels.fill(0);
        self.colours.fill(0);
        self.row = None;
        self.column = 0;

        self.events.push(VideoEvent::FrameReady);
    }

    /// Shift one display character into the frame being drawn.
    fn render(&mut self, address: u16, code: u8, memory: &dyn Fn(u16) -> u8) {
        // A new pixel row starts with the first display fetch of a line.
        // Without a genuine VSYNC the row sticks one past the bottom.
        if self.row.is_none() || self.row_line != self.line {
            self.row = Some(self.row.map_or(0, |row| (row + 1).min(PIXEL_ROWS as u16)));
            self.row_line = self.line;
            self.column = 0;
        }
        let Some(row) = self.row else { return };
        if usize::from(row) >= PIXEL_ROWS || usize::from(self.column) >= PIXEL_ROW_BYTES {
            return;
        }

        let pattern_addr = (u16::from(self.i_register) << 8)
            | (u16::from(code & 0x3F) << 3)
            | u16::from(self.sub_line);
        let mut pattern = memory(pattern_addr);
        if code & 0x80 != 0 {
            pattern = !pattern;
        }

        let index = usize::from(row) * PIXEL_ROW_BYTES + usize::from(self.column);
        self.pixels[index] = pattern;
        if self.chroma.enabled {
            self.colours[index] = self.chroma.colour(code, address & 0x7FFF, self.sub_line, memory);
        }
        self.column += 1;
    }
}

impl Zx81Video for BusUla {
    fn execute(
        &mut self,
        cycles: u32,
        refresh: u8,
        vector: u8,
        _memory: &dyn Fn(u16) -> u8,
        irq: &mut dyn InterruptSink,
    ) {
        self.i_register = vector;

        // Scheduled by the previous call.
        if self.int_pending {
            self.int_pending = false;
            irq.raise_interrupt(false, INT_DATA_BUS);
        }
        if self.prev_refresh & 0x40 != 0 && refresh & 0x40 == 0 {
            self.int_pending = true;
        }
        self.prev_refresh = refresh;

        self.elapsed += u64::from(cycles);
        self.since_vsync += u64::from(cycles);

        let line_length = self.config.tstates_per_line.max(1);
        let hsync_start = line_length.saturating_sub(self.config.hsync_low_tstates);
        self.line_tstate += cycles;
        loop {
            if !self.hsync_low && self.line_tstate >= hsync_start {
                self.hsync_low = true;
            }
            if self.line_tstate < line_length {
                break;
            }
            self.line_tstate -= line_length;
            self.hsync_low = false;
            self.line = self.line.wrapping_add(1);
            self.sub_line = (self.sub_line + 1) & 0x07;
            if self.nmi_enabled {
                irq.raise_interrupt(true, 0);
            }
        }

        if self.display_available && self.since_vsync >= 2 * self.frame_tstates {
            log::debug!("ULA: no VSYNC for two frames, display lost");
            self.display_available = false;
            self.events.push(VideoEvent::NoDisplay);
        }
    }

    fn fetch_opcode(&mut self, address: u16, value: u8, memory: &dyn Fn(u16) -> u8) -> u8 {
        if address & 0x8000 == 0 || value & 0x40 != 0 {
            return value;
        }
        self.render(address, value, memory);
        NOP
    }

    fn io_read(&mut self, port: u16) -> Option<u8> {
        if port & 0x0001 == 0 && !self.nmi_enabled && !self.vsync_active {
            self.vsync_active = true;
            self.vsync_start = self.elapsed;
        }
        (self.config.chroma81 && port == CHROMA_PORT).then_some(CHROMA_PRESENT)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        if self.vsync_active {
            self.end_vsync();
        }
        self.nmi_enabled = nmi_generator_write(port, self.nmi_enabled);
        if self.config.chroma81 && port == CHROMA_PORT {
            self.chroma.write(value);
        }
    }

    fn display_snapshot(&self, memory: &dyn Fn(u16) -> u8) -> DisplaySnapshot {
        if !self.display_available {
            return DisplaySnapshot::from_display_file(memory, &self.chroma);
        }
        DisplaySnapshot {
            kind: DisplayKind::Pixels,
            width: PIXEL_ROW_BYTES,
            height: PIXEL_ROWS,
            data: self.frame_pixels.clone(),
            colours: self.chroma.enabled.then(|| self.frame_colours.clone()),
            border: self.chroma.enabled.then_some(self.chroma.border),
        }
    }

    fn take_events(&mut self) -> Vec<VideoEvent> {
        std::mem::take(&mut self.events)
    }

    fn variant(&self) -> VideoVariant {
        VideoVariant::Bus
    }
}

impl SaveState for BusUla {
    fn save_state(&self, w: &mut SnapshotWriter) {
        w.write_u32(self.config.tstates_per_line);
        w.write_u32(self.config.hsync_low_tstates);
        w.write_u32(self.config.vsync_min_tstates);

        w.write_u64(self.elapsed);
        w.write_u32(self.line_tstate);
        w.write_bool(self.hsync_low);
        w.write_bool(self.vsync_active);
        w.write_u64(self.vsync_start);
        w.write_u16(self.line);
        w.write_u8(self.sub_line);

        w.write_bool(self.nmi_enabled);
        w.write_bool(self.int_pending);
        w.write_u8(self.prev_refresh);
        w.write_u8(self.i_register);

        w.write_bool(self.display_available);
        w.write_u64(self.since_vsync);
        w.write_u64(self.frames);
        self.chroma.save(w);

        w.write_bytes(&self.pixels);
        w.write_bytes(&self.colours);
        w.write_bool(self.row.is_some());
        w.write_u16(self.row.unwrap_or(0));
        w.write_u16(self.row_line);
        w.write_u8(self.column);
        w.write_bytes(&self.frame_pixels);
        w.write_bytes(&self.frame_colours);
    }

    fn load_state(&mut self, r: &mut SnapshotReader<'_>) -> Result<(), SnapshotError> {
        let mut next = self.clone();

        next.config.tstates_per_line = r.read_u32()?;
        next.config.hsync_low_tstates = r.read_u32()?;
        next.config.vsync_min_tstates = r.read_u32()?;
        if next.config.tstates_per_line == 0 {
            return Err(SnapshotError::InvalidValue {
                field: "ula.tstates_per_line",
                value: 0,
            });
        }

        next.elapsed = r.read_u64()?;
        next.line_tstate = r.read_u32()?;
        if next.line_tstate >= next.config.tstates_per_line {
            return Err(SnapshotError::InvalidValue {
                field: "ula.line_tstate",
                value: u64::from(next.line_tstate),
            });
        }
        next.hsync_low = r.read_bool()?;
        next.vsync_active = r.read_bool()?;
        next.vsync_start = r.read_u64()?;
        if next.vsync_start > next.elapsed {
            return Err(SnapshotError::InvalidValue {
                field: "ula.vsync_start",
                value: next.vsync_start,
            });
        }
        next.line = r.read_u16()?;
        next.sub_line = r.read_u8()?;
        if next.sub_line > 7 {
            return Err(SnapshotError::InvalidValue {
                field: "ula.sub_line",
                value: u64::from(next.sub_line),
            });
        }

        next.nmi_enabled = r.read_bool()?;
        next.int_pending = r.read_bool()?;
        next.prev_refresh = r.read_u8()?;
        next.i_register = r.read_u8()?;

        next.display_available = r.read_bool()?;
        next.since_vsync = r.read_u64()?;
        next.frames = r.read_u64()?;
        next.chroma = Chroma81::load(r)?;

        next.pixels = r.read_bytes(FRAME_BYTES)?.to_vec();
        next.colours = r.read_bytes(FRAME_BYTES)?.to_vec();
        let has_row = r.read_bool()?;
        let row = r.read_u16()?;
        if usize::from(row) > PIXEL_ROWS {
            return Err(SnapshotError::InvalidValue {
                field: "ula.row",
                value: u64::from(row),
            });
        }
        next.row = has_row.then_some(row);
        next.row_line = r.read_u16()?;
        next.column = r.read_u8()?;
        next.frame_pixels = r.read_bytes(FRAME_BYTES)?.to_vec();
        next.frame_colours = r.read_bytes(FRAME_BYTES)?.to_vec();
        next.events.clear();

        *self = next;
        Ok(())
    }
}

const QUERY_PATHS: &[&str] = &[
    "elapsed",
    "line",
    "sub_line",
    "line_tstate",
    "hsync_low",
    "vsync_active",
    "nmi_enabled",
    "int_pending",
    "display_available",
    "frames",
    "tstates_per_line",
    "hsync_low_tstates",
    "vsync_min_tstates",
    "chroma.enabled",
    "chroma.border",
];

impl Observable for BusUla {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "elapsed" => Some(self.elapsed.into()),
            "line" => Some(self.line.into()),
            "sub_line" => Some(self.sub_line.into()),
            "line_tstate" => Some(self.line_tstate.into()),
            "hsync_low" => Some(self.hsync_low.into()),
            "vsync_active" => Some(self.vsync_active.into()),
            "nmi_enabled" => Some(self.nmi_enabled.into()),
            "int_pending" => Some(self.int_pending.into()),
            "display_available" => Some(self.display_available.into()),
            "frames" => Some(self.frames.into()),
            "tstates_per_line" => Some(self.config.tstates_per_line.into()),
            "hsync_low_tstates" => Some(self.config.hsync_low_tstates.into()),
            "vsync_min_tstates" => Some(self.config.vsync_min_tstates.into()),
            "chroma.enabled" => Some(self.chroma.enabled.into()),
            "chroma.border" => Some(self.chroma.border.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
