//! ZX81 bus: memory, ULA snooping and port routing.
//!
//! The ULA sees every port access (it decodes A0/A1 partially and times
//! VSYNC from them) whether or not anything else answers. Reads are then
//! answered by, in order:
//!
//! 1. the zxnDMA on its control port
//! 2. the ULA, if it drives the data bus (Chroma81 detection)
//! 3. a custom handler registered by the host
//!
//! Nothing answering leaves the bus floating ($FF, decided by the CPU).

use emu_core::{Bus, IoBus};
use sinclair_zx81_ula::{DisplaySnapshot, Zx81Video};
use zilog_z80_dma::ZxnDma;

use crate::memory::Zx81Memory;
use crate::ports::{CustomPorts, PortError};

pub struct Zx81Bus {
    pub memory: Zx81Memory,
    pub video: Box<dyn Zx81Video>,
    /// Taken out while the DMA itself drives the bus.
    pub dma: Option<ZxnDma>,
    pub dma_port: Option<u16>,
    pub custom: CustomPorts,
}

impl Zx81Bus {
    #[must_use]
    pub fn new(memory: Zx81Memory, video: Box<dyn Zx81Video>, dma_port: Option<u16>) -> Self {
        Self {
            memory,
            video,
            dma: dma_port.map(|_| ZxnDma::new()),
            dma_port,
            custom: CustomPorts::new(),
        }
    }

    fn is_dma_port(&self, port: u16) -> bool {
        self.dma_port == Some(port)
    }

    /// Collect a port handler failure from the last instruction.
    pub fn take_port_error(&mut self) -> Option<PortError> {
        self.custom.take_error()
    }

    #[must_use]
    pub fn display_snapshot(&self) -> DisplaySnapshot {
        let memory = &self.memory;
        self.video.display_snapshot(&|addr| memory.read(addr))
    }
}

impl Bus for Zx81Bus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }

    fn peek(&self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn fetch(&mut self, address: u16) -> u8 {
        let value = self.memory.opcode_read(address);
        let memory = &self.memory;
        self.video
            .fetch_opcode(address, value, &|addr| memory.read(addr))
    }
}

impl IoBus for Zx81Bus {
    fn io_read(&mut self, port: u16) -> Option<u8> {
        let ula = self.video.io_read(port);

        if self.is_dma_port(port)
            && let Some(dma) = self.dma.as_mut()
        {
            return Some(dma.read_port());
        }
        if ula.is_some() {
            return ula;
        }
        self.custom.read(port)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.video.io_write(port, value);

        if self.is_dma_port(port)
            && let Some(dma) = self.dma.as_mut()
        {
            dma.write_port(value);
            return;
        }
        self.custom.write(port, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RamSize;
    use sinclair_zx81_ula::{CHROMA_PORT, CHROMA_PRESENT, UlaConfig, VideoVariant};

    fn bus(video: VideoVariant, chroma81: bool) -> Zx81Bus {
        let config = UlaConfig {
            chroma81,
            ..UlaConfig::default()
        };
        Zx81Bus::new(
            Zx81Memory::new(&[], RamSize::K16),
            video.build(config),
            Some(0x6B),
        )
    }

    #[test]
    fn display_bytes_fetch_as_nop_on_bus_ula() {
        let mut bus = bus(VideoVariant::Bus, false);
        bus.write(0x4100, 0x26);
        assert_eq!(bus.fetch(0xC100), 0x00);
        assert_eq!(bus.read(0xC100), 0x26);
        assert_eq!(bus.fetch(0x4100), 0x26);
    }

    #[test]
    fn frame_ula_leaves_fetches_alone() {
        let mut bus = bus(VideoVariant::Frame, false);
        bus.write(0x4100, 0x26);
        assert_eq!(bus.fetch(0xC100), 0x26);
    }

    #[test]
    fn dma_port_reads_status() {
        let mut bus = bus(VideoVariant::Bus, false);
        bus.io_write(0x6B, 0xBB);
        bus.io_write(0x6B, 0x01);
        assert_eq!(bus.io_read(0x6B), Some(0b0001_1010));
    }

    #[test]
    fn chroma_detection_reaches_the_cpu() {
        let mut bus = bus(VideoVariant::Bus, true);
        assert_eq!(bus.io_read(CHROMA_PORT), Some(CHROMA_PRESENT));
        assert_eq!(bus.io_read(0x1234), None);
    }
}
