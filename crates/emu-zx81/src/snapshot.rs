//! Machine snapshot container.
//!
//! Layout:
//!
//! | Field        | Size             |
//! |--------------|------------------|
//! | magic `Z81S` | 4                |
//! | version      | 1                |
//! | T-states     | 8                |
//! | RAM          | 48K ($4000-$FFFF)|
//! | video tag    | 1 (0 frame, 1 bus)|
//! | video state  | variant-specific |
//! | DMA fitted   | 1                |
//! | DMA state    | if fitted        |
//!
//! CPU registers belong to the host's CPU core and are not included.

use emu_core::{SaveState, SnapshotError, SnapshotReader, SnapshotWriter};
use sinclair_zx81_ula::{UlaConfig, VideoVariant, Zx81Video};
use zilog_z80_dma::ZxnDma;

use crate::bus::Zx81Bus;
use crate::memory::Zx81Memory;

const SNAPSHOT_MAGIC: &[u8; 4] = b"Z81S";
const SNAPSHOT_VERSION: u8 = 1;

pub(crate) fn save(bus: &Zx81Bus, tstates: u64) -> Vec<u8> {
    let mut w = SnapshotWriter::new();
    w.write_bytes(SNAPSHOT_MAGIC);
    w.write_u8(SNAPSHOT_VERSION);
    w.write_u64(tstates);
    bus.memory.save(&mut w);

    w.write_u8(bus.video.variant().tag());
    bus.video.save_state(&mut w);

    match &bus.dma {
        Some(dma) => {
            w.write_bool(true);
            dma.save_state(&mut w);
        }
        None => w.write_bool(false),
    }
    w.into_bytes()
}

/// Everything decoded from a container, ready to swap in.
pub(crate) struct Restored {
    pub tstates: u64,
    pub ram: Vec<u8>,
    pub video: Box<dyn Zx81Video>,
    pub dma: Option<ZxnDma>,
}

pub(crate) fn restore(data: &[u8], ula: UlaConfig) -> Result<Restored, SnapshotError> {
    let mut r = SnapshotReader::new(data);
    if r.read_bytes(SNAPSHOT_MAGIC.len())? != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = r.read_u8()?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let tstates = r.read_u64()?;
    let ram = Zx81Memory::load_ram(&mut r)?;

    let tag = r.read_u8()?;
    let variant = VideoVariant::from_tag(tag).ok_or(SnapshotError::InvalidValue {
        field: "video.variant",
        value: u64::from(tag),
    })?;
    let mut video = variant.build(ula);
    video.load_state(&mut r)?;

    let dma = if r.read_bool()? {
        let mut dma = ZxnDma::new();
        dma.load_state(&mut r)?;
        Some(dma)
    } else {
        None
    };

    r.finish()?;
    Ok(Restored {
        tstates,
        ram,
        video,
        dma,
    })
}
