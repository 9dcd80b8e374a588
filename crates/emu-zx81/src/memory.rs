//! ZX81 memory map.
//!
//! - $0000-$1FFF: 8K ROM, mirrored at $2000-$3FFF
//! - $4000-$7FFF: RAM (1K mirrored 16 times, or 16K)
//! - $8000-$FFFF: echo of $0000-$7FFF on 1K/16K machines
//!
//! The echo matters: the ROM "executes" the display file at D_FILE + $8000
//! so the ULA can intercept the fetches. On 48K machines the upper 32K is
//! real RAM for data (Chroma81 keeps its colour tables there), and opcode
//! fetches above $8000 still see the echo of the lower half.

use emu_core::{SnapshotError, SnapshotReader, SnapshotWriter};

use crate::config::RamSize;

/// Backing store covers $4000-$FFFF whatever is fitted.
pub const RAM_BYTES: usize = 0xC000;

const ROM_WINDOW: usize = 0x4000;

pub struct Zx81Memory {
    rom: Vec<u8>,
    ram: Vec<u8>,
    size: RamSize,
}

impl Zx81Memory {
    /// `rom` is truncated to 16K. An empty ROM reads as $FF.
    #[must_use]
    pub fn new(rom: &[u8], size: RamSize) -> Self {
        Self {
            rom: rom[..rom.len().min(ROM_WINDOW)].to_vec(),
            ram: vec![0; RAM_BYTES],
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> RamSize {
        self.size
    }

    /// Offset into `ram` for a RAM address, `None` for ROM.
    fn ram_offset(&self, addr: u16) -> Option<usize> {
        match self.size {
            RamSize::K1 => (addr & 0x7FFF >= 0x4000).then_some(usize::from(addr & 0x03FF)),
            RamSize::K16 => (addr & 0x7FFF >= 0x4000).then_some(usize::from(addr & 0x3FFF)),
            RamSize::K48 => (addr >= 0x4000).then(|| usize::from(addr) - ROM_WINDOW),
        }
    }

    fn rom_byte(&self, addr: u16) -> u8 {
        if self.rom.is_empty() {
            return 0xFF;
        }
        self.rom[usize::from(addr & 0x3FFF) % self.rom.len()]
    }

    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match self.ram_offset(addr) {
            Some(offset) => self.ram[offset],
            None => self.rom_byte(addr),
        }
    }

    /// ROM writes are ignored.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(offset) = self.ram_offset(addr) {
            self.ram[offset] = value;
        }
    }

    /// What an M1 cycle sees.
    #[must_use]
    pub fn opcode_read(&self, addr: u16) -> u8 {
        if self.size == RamSize::K48 && addr & 0x8000 != 0 {
            self.read(addr & 0x7FFF)
        } else {
            self.read(addr)
        }
    }

    /// Raw RAM, offset 0 = $4000.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub(crate) fn save(&self, w: &mut SnapshotWriter) {
        w.write_bytes(&self.ram);
    }

    pub(crate) fn load_ram(r: &mut SnapshotReader<'_>) -> Result<Vec<u8>, SnapshotError> {
        Ok(r.read_bytes(RAM_BYTES)?.to_vec())
    }

    pub(crate) fn replace_ram(&mut self, ram: Vec<u8>) {
        self.ram = ram;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> Vec<u8> {
        (0..0x2000).map(|i| (i & 0xFF) as u8).collect()
    }

    #[test]
    fn rom_is_mirrored_and_read_only() {
        let mut mem = Zx81Memory::new(&rom(), RamSize::K16);
        assert_eq!(mem.read(0x0012), 0x12);
        assert_eq!(mem.read(0x2012), 0x12);
        mem.write(0x0012, 0xAA);
        assert_eq!(mem.read(0x0012), 0x12);
    }

    #[test]
    fn one_k_ram_repeats() {
        let mut mem = Zx81Memory::new(&rom(), RamSize::K1);
        mem.write(0x4000, 0x5A);
        assert_eq!(mem.read(0x4400), 0x5A);
        assert_eq!(mem.read(0x7C00), 0x5A);
        assert_eq!(mem.read(0xC000), 0x5A);
    }

    #[test]
    fn upper_half_echoes_sixteen_k() {
        let mut mem = Zx81Memory::new(&rom(), RamSize::K16);
        mem.write(0x4123, 0x26);
        assert_eq!(mem.read(0xC123), 0x26);
        assert_eq!(mem.opcode_read(0xC123), 0x26);
        assert_eq!(mem.read(0x8012), 0x12);
    }

    #[test]
    fn forty_eight_k_upper_ram_is_data_only() {
        let mut mem = Zx81Memory::new(&rom(), RamSize::K48);
        mem.write(0x4123, 0x26);
        mem.write(0xC123, 0x99);
        assert_eq!(mem.read(0xC123), 0x99);
        assert_eq!(mem.opcode_read(0xC123), 0x26);
    }

    #[test]
    fn missing_rom_floats_high() {
        let mem = Zx81Memory::new(&[], RamSize::K16);
        assert_eq!(mem.read(0x0000), 0xFF);
    }
}
