//! Logical frame-buffer ULA.
//!
//! No beam tracking at all. A frame timer raises INT every nominal frame
//! and copies the display file; that is enough for programs that run in
//! FAST mode or only print through the ROM.

use emu_core::{
    InterruptSink, Observable, SaveState, SnapshotError, SnapshotReader, SnapshotWriter, Value,
};

use crate::chroma::{CHROMA_PORT, CHROMA_PRESENT, Chroma81};
use crate::config::UlaConfig;
use crate::display::{CHAR_COLUMNS, CHAR_ROWS, DisplayKind, DisplaySnapshot};
use crate::{INT_DATA_BUS, VideoEvent, VideoVariant, Zx81Video, nmi_generator_write};

/// Frame-timer ULA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUla {
    config: UlaConfig,
    frame_tstates: u64,
    /// T-states since power-on.
    elapsed: u64,
    /// T-states into the current frame.
    frame_position: u64,
    frames: u64,
    nmi_enabled: bool,
    chroma: Chroma81,
    /// Last captured display file.
    snapshot: DisplaySnapshot,
    events: Vec<VideoEvent>,
}

impl FrameUla {
    #[must_use]
    pub fn new(config: UlaConfig) -> Self {
        Self {
            frame_tstates: config.frame_tstates().max(1),
            config,
            elapsed: 0,
            frame_position: 0,
            frames: 0,
            nmi_enabled: false,
            chroma: Chroma81::new(),
            snapshot: blank_characters(),
            events: Vec::new(),
        }
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    #[must_use]
    pub fn chroma(&self) -> &Chroma81 {
        &self.chroma
    }
}

fn blank_characters() -> DisplaySnapshot {
    DisplaySnapshot {
        kind: DisplayKind::Characters,
        width: CHAR_COLUMNS,
        height: CHAR_ROWS,
        data: vec![0; CHAR_COLUMNS * CHAR_ROWS],
        colours: None,
        border: None,
    }
}

impl Zx81Video for FrameUla {
    fn execute(
        &mut self,
        cycles: u32,
        _refresh: u8,
        _vector: u8,
        memory: &dyn Fn(u16) -> u8,
        irq: &mut dyn InterruptSink,
    ) {
        self.elapsed += u64::from(cycles);
        self.frame_position += u64::from(cycles);

        while self.frame_position >= self.frame_tstates {
            self.frame_position -= self.frame_tstates;
            self.frames += 1;
            self.snapshot = DisplaySnapshot::from_display_file(memory, &self.chroma);
            irq.raise_interrupt(false, INT_DATA_BUS);
            self.events.push(VideoEvent::FrameReady);
        }
    }

    fn io_read(&mut self, port: u16) -> Option<u8> {
        (self.config.chroma81 && port == CHROMA_PORT).then_some(CHROMA_PRESENT)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        if self.config.chroma81 && port == CHROMA_PORT {
            self.chroma.write(value);
            return;
        }
        self.nmi_enabled = nmi_generator_write(port, self.nmi_enabled);
    }

    fn display_snapshot(&self, _memory: &dyn Fn(u16) -> u8) -> DisplaySnapshot {
        self.snapshot.clone()
    }

    fn take_events(&mut self) -> Vec<VideoEvent> {
        std::mem::take(&mut self.events)
    }

    fn variant(&self) -> VideoVariant {
        VideoVariant::Frame
    }
}

impl SaveState for FrameUla {
    /// Field order: elapsed, frame position, frames, NMI generator, Chroma81,
    /// captured characters (768), colour flag + colours (768) + border.
    fn save_state(&self, w: &mut SnapshotWriter) {
        w.write_u64(self.elapsed);
        w.write_u64(self.frame_position);
        w.write_u64(self.frames);
        w.write_bool(self.nmi_enabled);
        self.chroma.save(w);
        w.write_bytes(&self.snapshot.data);
        match &self.snapshot.colours {
            Some(colours) => {
                w.write_bool(true);
                w.write_bytes(colours);
                w.write_u8(self.snapshot.border.unwrap_or(0));
            }
            None => w.write_bool(false),
        }
    }

    fn load_state(&mut self, r: &mut SnapshotReader<'_>) -> Result<(), SnapshotError> {
        let cells = CHAR_COLUMNS * CHAR_ROWS;
        let elapsed = r.read_u64()?;
        let frame_position = r.read_u64()?;
        if frame_position >= self.frame_tstates {
            return Err(SnapshotError::InvalidValue {
                field: "ula.frame_position",
                value: frame_position,
            });
        }
        let frames = r.read_u64()?;
        let nmi_enabled = r.read_bool()?;
        let chroma = Chroma81::load(r)?;
        let data = r.read_bytes(cells)?.to_vec();
        let (colours, border) = if r.read_bool()? {
            let colours = r.read_bytes(cells)?.to_vec();
            (Some(colours), Some(r.read_u8()? & 0x0F))
        } else {
            (None, None)
        };

        self.elapsed = elapsed;
        self.frame_position = frame_position;
        self.frames = frames;
        self.nmi_enabled = nmi_enabled;
        self.chroma = chroma;
        self.snapshot = DisplaySnapshot {
            data,
            colours,
            border,
            ..blank_characters()
        };
        self.events.clear();
        Ok(())
    }
}

const QUERY_PATHS: &[&str] = &[
    "elapsed",
    "frame_position",
    "frames",
    "nmi_enabled",
    "chroma.enabled",
    "chroma.border",
];

impl Observable for FrameUla {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "elapsed" => Some(self.elapsed.into()),
            "frame_position" => Some(self.frame_position.into()),
            "frames" => Some(self.frames.into()),
            "nmi_enabled" => Some(self.nmi_enabled.into()),
            "chroma.enabled" => Some(self.chroma.enabled.into()),
            "chroma.border" => Some(self.chroma.border.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
