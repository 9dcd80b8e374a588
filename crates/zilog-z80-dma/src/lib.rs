//! Z80 DMA controller, zxnDMA flavour.
//!
//! Standalone chip crate: the DMA talks to memory and ports only through the
//! `emu_core::IoBus` passed to `execute()`, and to the CPU only through its
//! single control port (`write_port` / `read_port`).
//!
//! # Write protocol
//!
//! The CPU programs the DMA by writing a stream of bytes to one port. The
//! first byte of each group selects a write register (WR0-WR6) and flags
//! which optional parameter bytes follow:
//!
//! | Register | Select pattern | Parameters                                  |
//! |----------|----------------|---------------------------------------------|
//! | WR0      | `0xxxxxAA`, AA≠0 | A start lo/hi, length lo/hi (bits 3-6)    |
//! | WR1      | `0xxxx100`     | port A timing (bit 6)                       |
//! | WR2      | `0xxxx000`     | port B timing (bit 6), then prescalar       |
//! | WR3      | `1xxxxx00`     | mask (bit 3), match (bit 4)                 |
//! | WR4      | `1xxxxx01`     | B start lo/hi (bits 2-3), int ctrl (bit 4)  |
//! | WR5      | `10xxx010`     | none                                        |
//! | WR6      | `1xxxxx11`     | the byte is a command; `$BB` takes a mask   |
//!
//! # Timing
//!
//! A continuous transfer costs `(cost A + cost B) * length` T-states, where
//! a port's cost is its programmed cycle length or the default of 3
//! (memory) / 4 (I/O).
//!
//! # Not modelled
//!
//! Byte and burst modes, and any transfer with a non-zero prescalar, would
//! interleave with the CPU. `execute()` returns 0 for those and leaves the
//! register file alone.

#![allow(clippy::cast_possible_truncation)]

mod commands;
mod registers;

pub use commands::Command;
pub use registers::{
    AddressMode, DecodeState, Direction, PortConfig, PortKind, TransferMode, WriteRegister,
    IO_CYCLES, MEMORY_CYCLES,
};

use emu_core::{IoBus, Observable, SaveState, SnapshotError, SnapshotReader, SnapshotWriter, Value};
use registers::{address_mode_from_u8, address_mode_to_u8};

/// Fixed bits of the status byte (`00E1101T` on the zxnDMA).
const STATUS_FIXED: u8 = 0b0001_1010;
/// Status: block finished.
pub const STATUS_END_OF_BLOCK: u8 = 0x20;
/// Status: at least one byte moved.
pub const STATUS_TRANSFERRED: u8 = 0x01;

/// All seven readable counters.
const READ_MASK_ALL: u8 = 0x7F;

// Parameter bits, per register.
const WR0_A_START_LO: u8 = 0x08;
const WR0_A_START_HI: u8 = 0x10;
const WR0_LENGTH_LO: u8 = 0x20;
const WR0_LENGTH_HI: u8 = 0x40;
const WR12_TIMING: u8 = 0x40;
const WR2_PRESCALAR: u8 = 0x20;
const WR3_MASK: u8 = 0x08;
const WR3_MATCH: u8 = 0x10;
const WR4_B_START_LO: u8 = 0x04;
const WR4_B_START_HI: u8 = 0x08;
const WR4_INT_CONTROL: u8 = 0x10;
const WR4_PULSE: u8 = 0x20;
const WR4_VECTOR: u8 = 0x40;
const WR6_READ_MASK: u8 = 0x01;

/// zxnDMA controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZxnDma {
    decode: DecodeState,

    direction: Direction,
    port_a: PortConfig,
    port_b: PortConfig,
    block_length: u16,
    mode: TransferMode,
    auto_restart: bool,
    prescalar: u8,
    /// WR5 bit 4: CE/WAIT multiplexed.
    ce_wait: bool,
    /// WR5 bit 3: READY active high.
    ready_active_high: bool,
    /// WR3 parameters. Stored for read-back only; search is not modelled.
    mask_byte: u8,
    match_byte: u8,
    /// WR4 interrupt parameters. Stored only.
    interrupt_control: u8,
    pulse_control: u8,
    interrupt_vector: u8,

    enabled: bool,
    /// Bytes moved in the current block.
    byte_counter: u16,
    end_of_block: bool,
    transferred: bool,

    read_mask: u8,
    /// Next read-mask bit to consider (0-6).
    read_index: u8,
}

impl ZxnDma {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decode: DecodeState::default(),
            direction: Direction::AToB,
            port_a: PortConfig::new(),
            port_b: PortConfig::new(),
            block_length: 0,
            mode: TransferMode::Continuous,
            auto_restart: false,
            prescalar: 0,
            ce_wait: false,
            ready_active_high: false,
            mask_byte: 0,
            match_byte: 0,
            interrupt_control: 0,
            pulse_control: 0,
            interrupt_vector: 0,
            enabled: false,
            byte_counter: 0,
            end_of_block: false,
            transferred: false,
            read_mask: READ_MASK_ALL,
            read_index: 0,
        }
    }

    /// Feed one byte written to the DMA port into the decoder.
    pub fn write_port(&mut self, value: u8) {
        match self.decode.register {
            Some(register) if !self.decode.is_idle() => self.write_parameter(register, value),
            _ => self.select_register(value),
        }
    }

    /// Read the next counter in the read sequence.
    ///
    /// Rotates through the set bits of the read mask: status, block counter
    /// lo/hi, port A counter lo/hi, port B counter lo/hi.
    pub fn read_port(&mut self) -> u8 {
        let mask = self.read_mask & READ_MASK_ALL;
        if mask == 0 {
            log::warn!("DMA: port read with empty read mask");
            return 0;
        }

        let mut bit = self.read_index % 7;
        while mask & (1 << bit) == 0 {
            bit = (bit + 1) % 7;
        }
        self.read_index = (bit + 1) % 7;

        match bit {
            0 => self.status(),
            1 => self.byte_counter as u8,
            2 => (self.byte_counter >> 8) as u8,
            3 => self.port_a.counter as u8,
            4 => (self.port_a.counter >> 8) as u8,
            5 => self.port_b.counter as u8,
            _ => (self.port_b.counter >> 8) as u8,
        }
    }

    /// Run the DMA before the next CPU instruction.
    ///
    /// Returns the T-states the DMA held the bus for. A continuous block is
    /// transferred completely within this call, so the CPU never sees a
    /// half-copied block.
    pub fn execute<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        if !self.enabled {
            return 0;
        }
        if self.mode != TransferMode::Continuous || self.prescalar != 0 {
            log::trace!(
                "DMA: {:?} mode, prescalar {}: interleaved transfer not modelled",
                self.mode,
                self.prescalar
            );
            return 0;
        }

        let length = self.block_length;
        for _ in 0..length {
            let (source, dest) = match self.direction {
                Direction::AToB => (&self.port_a, &self.port_b),
                Direction::BToA => (&self.port_b, &self.port_a),
            };
            let value = source.read(bus);
            dest.write(bus, value);

            self.port_a.advance();
            self.port_b.advance();
            self.byte_counter = self.byte_counter.wrapping_add(1);
        }

        self.byte_counter = 0;
        self.end_of_block = true;
        self.transferred = length > 0;
        self.enabled = false;
        if self.auto_restart {
            self.load_counters();
        }

        let per_byte = u32::from(self.port_a.byte_cost()) + u32::from(self.port_b.byte_cost());
        let cycles = per_byte * u32::from(length);
        log::debug!(
            "DMA: {length} bytes {:?} A=${:04X} B=${:04X}, {cycles} T-states",
            self.direction,
            self.port_a.start,
            self.port_b.start
        );
        cycles
    }

    /// Status byte: `00E1101T`.
    #[must_use]
    pub fn status(&self) -> u8 {
        let mut status = STATUS_FIXED;
        if self.end_of_block {
            status |= STATUS_END_OF_BLOCK;
        }
        if self.transferred {
            status |= STATUS_TRANSFERRED;
        }
        status
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn decode_state(&self) -> DecodeState {
        self.decode
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn port_a(&self) -> &PortConfig {
        &self.port_a
    }

    #[must_use]
    pub fn port_b(&self) -> &PortConfig {
        &self.port_b
    }

    #[must_use]
    pub fn block_length(&self) -> u16 {
        self.block_length
    }

    #[must_use]
    pub fn byte_counter(&self) -> u16 {
        self.byte_counter
    }

    #[must_use]
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    #[must_use]
    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    #[must_use]
    pub fn prescalar(&self) -> u8 {
        self.prescalar
    }

    #[must_use]
    pub fn read_mask(&self) -> u8 {
        self.read_mask
    }

    // === Decoder ===

    fn select_register(&mut self, value: u8) {
        let register = WriteRegister::select(value);
        let pending = match register {
            WriteRegister::Wr0 => {
                self.direction = if value & 0x04 != 0 {
                    Direction::AToB
                } else {
                    Direction::BToA
                };
                value & (WR0_A_START_LO | WR0_A_START_HI | WR0_LENGTH_LO | WR0_LENGTH_HI)
            }
            WriteRegister::Wr1 => {
                self.port_a.configure(value);
                value & WR12_TIMING
            }
            WriteRegister::Wr2 => {
                self.port_b.configure(value);
                value & WR12_TIMING
            }
            WriteRegister::Wr3 => {
                if value & 0x40 != 0 {
                    self.enabled = true;
                }
                value & (WR3_MASK | WR3_MATCH)
            }
            WriteRegister::Wr4 => {
                self.mode = TransferMode::from_bits(value >> 5);
                value & (WR4_B_START_LO | WR4_B_START_HI | WR4_INT_CONTROL)
            }
            WriteRegister::Wr5 => {
                self.auto_restart = value & 0x20 != 0;
                self.ce_wait = value & 0x10 != 0;
                self.ready_active_high = value & 0x08 != 0;
                0
            }
            WriteRegister::Wr6 => self.command(value),
        };
        self.decode = DecodeState {
            register: Some(register),
            pending,
        };
    }

    fn write_parameter(&mut self, register: WriteRegister, value: u8) {
        let bit = self.decode.pending & self.decode.pending.wrapping_neg();
        self.decode.pending &= !bit;

        match (register, bit) {
            (WriteRegister::Wr0, WR0_A_START_LO) => set_lo(&mut self.port_a.start, value),
            (WriteRegister::Wr0, WR0_A_START_HI) => set_hi(&mut self.port_a.start, value),
            (WriteRegister::Wr0, WR0_LENGTH_LO) => set_lo(&mut self.block_length, value),
            (WriteRegister::Wr0, WR0_LENGTH_HI) => set_hi(&mut self.block_length, value),
            (WriteRegister::Wr1, WR12_TIMING) => self.port_a.set_timing(value),
            (WriteRegister::Wr2, WR12_TIMING) => {
                self.port_b.set_timing(value);
                if value & 0x20 != 0 {
                    self.decode.pending |= WR2_PRESCALAR;
                }
            }
            (WriteRegister::Wr2, WR2_PRESCALAR) => self.prescalar = value,
            (WriteRegister::Wr3, WR3_MASK) => self.mask_byte = value,
            (WriteRegister::Wr3, WR3_MATCH) => self.match_byte = value,
            (WriteRegister::Wr4, WR4_B_START_LO) => set_lo(&mut self.port_b.start, value),
            (WriteRegister::Wr4, WR4_B_START_HI) => set_hi(&mut self.port_b.start, value),
            (WriteRegister::Wr4, WR4_INT_CONTROL) => {
                self.interrupt_control = value;
                if value & 0x08 != 0 {
                    self.decode.pending |= WR4_PULSE;
                }
                if value & 0x10 != 0 {
                    self.decode.pending |= WR4_VECTOR;
                }
            }
            (WriteRegister::Wr4, WR4_PULSE) => self.pulse_control = value,
            (WriteRegister::Wr4, WR4_VECTOR) => self.interrupt_vector = value,
            (WriteRegister::Wr6, WR6_READ_MASK) => {
                self.read_mask = value & READ_MASK_ALL;
                self.read_index = 0;
            }
            _ => log::debug!("DMA: stray parameter {value:#04X} for {}", register.name()),
        }
    }

    /// Execute a WR6 command. Returns the parameter bits it expects.
    fn command(&mut self, value: u8) -> u8 {
        let Some(command) = Command::from_byte(value) else {
            log::debug!("DMA: ignoring unknown command {value:#04X}");
            return 0;
        };

        match command {
            Command::Reset => {
                self.enabled = false;
                self.port_a.cycle_length = 0;
                self.port_b.cycle_length = 0;
                self.prescalar = 0;
                self.auto_restart = false;
                self.ce_wait = false;
                self.ready_active_high = false;
                self.end_of_block = false;
                self.transferred = false;
                self.read_mask = READ_MASK_ALL;
                self.read_index = 0;
            }
            Command::ResetPortATiming => self.port_a.cycle_length = 0,
            Command::ResetPortBTiming => self.port_b.cycle_length = 0,
            Command::ReadStatus => {
                self.read_mask = 0x01;
                self.read_index = 0;
            }
            Command::ReinitializeStatus => {
                self.end_of_block = false;
                self.transferred = false;
            }
            Command::InitializeReadSequence => self.read_index = 0,
            Command::Load => {
                self.load_counters();
                self.byte_counter = 0;
            }
            Command::Continue => self.byte_counter = 0,
            Command::Enable => self.enabled = true,
            Command::Disable => self.enabled = false,
            Command::ReadMaskFollows => return WR6_READ_MASK,
            Command::ForceReady | Command::Interrupt => {
                log::trace!("DMA: command {value:#04X} has no effect");
            }
        }
        0
    }

    fn load_counters(&mut self) {
        self.port_a.counter = self.port_a.start;
        self.port_b.counter = self.port_b.start;
    }
}

impl Default for ZxnDma {
    fn default() -> Self {
        Self::new()
    }
}

fn set_lo(field: &mut u16, value: u8) {
    *field = (*field & 0xFF00) | u16::from(value);
}

fn set_hi(field: &mut u16, value: u8) {
    *field = (*field & 0x00FF) | (u16::from(value) << 8);
}

// === Snapshot ===

fn save_port(w: &mut SnapshotWriter, port: &PortConfig) {
    w.write_u16(port.start);
    w.write_u8(address_mode_to_u8(port.mode));
    w.write_bool(port.kind == PortKind::Io);
    w.write_u8(port.cycle_length);
    w.write_u16(port.counter);
}

fn load_port(r: &mut SnapshotReader<'_>) -> Result<PortConfig, SnapshotError> {
    Ok(PortConfig {
        start: r.read_u16()?,
        mode: address_mode_from_u8(r.read_u8()?)?,
        kind: if r.read_bool()? {
            PortKind::Io
        } else {
            PortKind::Memory
        },
        cycle_length: r.read_u8()?,
        counter: r.read_u16()?,
    })
}

fn mode_to_u8(mode: TransferMode) -> u8 {
    match mode {
        TransferMode::Byte => 0,
        TransferMode::Continuous => 1,
        TransferMode::Burst => 2,
    }
}

fn mode_from_u8(value: u8) -> Result<TransferMode, SnapshotError> {
    match value {
        0 => Ok(TransferMode::Byte),
        1 => Ok(TransferMode::Continuous),
        2 => Ok(TransferMode::Burst),
        _ => Err(SnapshotError::InvalidValue {
            field: "dma.mode",
            value: u64::from(value),
        }),
    }
}

impl SaveState for ZxnDma {
    /// Field order: direction, port A, port B, length, mode, auto-restart,
    /// prescalar, CE/WAIT, READY polarity, mask, match, int control, pulse,
    /// vector, enabled, byte counter, end-of-block, transferred, read mask,
    /// read index, decode register (0 = none, 1-7 = WR0-WR6), pending bits.
    fn save_state(&self, w: &mut SnapshotWriter) {
        w.write_bool(self.direction == Direction::AToB);
        save_port(w, &self.port_a);
        save_port(w, &self.port_b);
        w.write_u16(self.block_length);
        w.write_u8(mode_to_u8(self.mode));
        w.write_bool(self.auto_restart);
        w.write_u8(self.prescalar);
        w.write_bool(self.ce_wait);
        w.write_bool(self.ready_active_high);
        w.write_u8(self.mask_byte);
        w.write_u8(self.match_byte);
        w.write_u8(self.interrupt_control);
        w.write_u8(self.pulse_control);
        w.write_u8(self.interrupt_vector);
        w.write_bool(self.enabled);
        w.write_u16(self.byte_counter);
        w.write_bool(self.end_of_block);
        w.write_bool(self.transferred);
        w.write_u8(self.read_mask);
        w.write_u8(self.read_index);
        w.write_u8(self.decode.register.map_or(0, |reg| reg.index() + 1));
        w.write_u8(self.decode.pending);
    }

    fn load_state(&mut self, r: &mut SnapshotReader<'_>) -> Result<(), SnapshotError> {
        let direction = if r.read_bool()? {
            Direction::AToB
        } else {
            Direction::BToA
        };
        let port_a = load_port(r)?;
        let port_b = load_port(r)?;
        let block_length = r.read_u16()?;
        let mode = mode_from_u8(r.read_u8()?)?;

        let mut scratch = Self {
            direction,
            port_a,
            port_b,
            block_length,
            mode,
            auto_restart: r.read_bool()?,
            prescalar: r.read_u8()?,
            ce_wait: r.read_bool()?,
            ready_active_high: r.read_bool()?,
            mask_byte: r.read_u8()?,
            match_byte: r.read_u8()?,
            interrupt_control: r.read_u8()?,
            pulse_control: r.read_u8()?,
            interrupt_vector: r.read_u8()?,
            enabled: r.read_bool()?,
            byte_counter: r.read_u16()?,
            end_of_block: r.read_bool()?,
            transferred: r.read_bool()?,
            read_mask: r.read_u8()? & READ_MASK_ALL,
            read_index: r.read_u8()?,
            decode: DecodeState::default(),
        };
        if scratch.read_index > 6 {
            return Err(SnapshotError::InvalidValue {
                field: "dma.read_index",
                value: u64::from(scratch.read_index),
            });
        }

        let register = match r.read_u8()? {
            0 => None,
            n => Some(WriteRegister::from_index(n - 1).ok_or(SnapshotError::InvalidValue {
                field: "dma.decode.register",
                value: u64::from(n),
            })?),
        };
        scratch.decode = DecodeState {
            register,
            pending: r.read_u8()?,
        };

        *self = scratch;
        Ok(())
    }
}

// === Observable ===

const QUERY_PATHS: &[&str] = &[
    "enabled",
    "direction",
    "mode",
    "auto_restart",
    "prescalar",
    "block_length",
    "byte_counter",
    "status",
    "read_mask",
    "decode.register",
    "decode.pending",
    "port_a.start",
    "port_a.counter",
    "port_a.step",
    "port_a.io",
    "port_a.cycle_length",
    "port_b.start",
    "port_b.counter",
    "port_b.step",
    "port_b.io",
    "port_b.cycle_length",
];

fn query_port(port: &PortConfig, field: &str) -> Option<Value> {
    match field {
        "start" => Some(port.start.into()),
        "counter" => Some(port.counter.into()),
        "step" => Some(port.mode.step().into()),
        "io" => Some((port.kind == PortKind::Io).into()),
        "cycle_length" => Some(port.cycle_length.into()),
        _ => None,
    }
}

impl Observable for ZxnDma {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(field) = path.strip_prefix("port_a.") {
            return query_port(&self.port_a, field);
        }
        if let Some(field) = path.strip_prefix("port_b.") {
            return query_port(&self.port_b, field);
        }
        match path {
            "enabled" => Some(self.enabled.into()),
            "direction" => Some(match self.direction {
                Direction::AToB => "a_to_b".into(),
                Direction::BToA => "b_to_a".into(),
            }),
            "mode" => Some(match self.mode {
                TransferMode::Byte => "byte".into(),
                TransferMode::Continuous => "continuous".into(),
                TransferMode::Burst => "burst".into(),
            }),
            "auto_restart" => Some(self.auto_restart.into()),
            "prescalar" => Some(self.prescalar.into()),
            "block_length" => Some(self.block_length.into()),
            "byte_counter" => Some(self.byte_counter.into()),
            "status" => Some(self.status().into()),
            "read_mask" => Some(self.read_mask.into()),
            "decode.register" => Some(self.decode.register.map_or("none", WriteRegister::name).into()),
            "decode.pending" => Some(self.decode.pending.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::FlatBus;

    fn write_all(dma: &mut ZxnDma, bytes: &[u8]) {
        for &b in bytes {
            dma.write_port(b);
        }
    }

    /// WR0 A->B, A=$4000, length 16; WR1/WR2 memory increment; WR4
    /// continuous with B=$8000.
    fn program_copy(dma: &mut ZxnDma) {
        write_all(dma, &[0x7D, 0x00, 0x40, 0x10, 0x00]);
        write_all(dma, &[0x14]);
        write_all(dma, &[0x10]);
        write_all(dma, &[0xAD, 0x00, 0x80]);
    }

    #[test]
    fn wr0_parameters_land_low_byte_first() {
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x7D, 0x34, 0x12, 0x78, 0x56]);
        assert_eq!(dma.port_a().start, 0x1234);
        assert_eq!(dma.block_length(), 0x5678);
        assert_eq!(dma.direction(), Direction::AToB);
        assert!(dma.decode_state().is_idle());
    }

    #[test]
    fn wr0_parameter_subsets() {
        // Every subset of the four optional bytes.
        for flags in 0u8..16 {
            let mut dma = ZxnDma::new();
            let header = 0x01 | (flags << 3);
            dma.write_port(header);
            let mut expected_start = 0u16;
            let mut expected_len = 0u16;
            if flags & 1 != 0 {
                dma.write_port(0xA1);
                expected_start |= 0x00A1;
            }
            if flags & 2 != 0 {
                dma.write_port(0xB2);
                expected_start |= 0xB200;
            }
            if flags & 4 != 0 {
                dma.write_port(0xC3);
                expected_len |= 0x00C3;
            }
            if flags & 8 != 0 {
                dma.write_port(0xD4);
                expected_len |= 0xD400;
            }
            assert!(dma.decode_state().is_idle(), "flags {flags:04b} not drained");
            assert_eq!(dma.port_a().start, expected_start, "flags {flags:04b}");
            assert_eq!(dma.block_length(), expected_len, "flags {flags:04b}");
            assert_eq!(dma.direction(), Direction::BToA);
        }
    }

    #[test]
    fn decoder_returns_to_select_after_parameters() {
        let mut dma = ZxnDma::new();
        dma.write_port(0x79); // WR0, B->A, A lo/hi + length lo/hi
        assert_eq!(dma.decode_state().pending, 0x78);
        write_all(&mut dma, &[0, 0, 0]);
        assert_eq!(dma.decode_state().pending, 0x40);
        dma.write_port(0);
        assert!(dma.decode_state().is_idle());

        // Next byte is a register select again: $87 enables.
        dma.write_port(0x87);
        assert!(dma.is_enabled());
    }

    #[test]
    fn scenario_copy_sixteen_bytes() {
        let mut bus = FlatBus::new();
        for i in 0..16u16 {
            bus.memory[0x4000 + i as usize] = 0xA0 + i as u8;
        }

        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        dma.write_port(0xCF);
        dma.write_port(0x87);

        assert_eq!(dma.execute(&mut bus), 96);
        for i in 0..16usize {
            assert_eq!(bus.memory[0x8000 + i], 0xA0 + i as u8);
        }
        assert_eq!(bus.memory[0x8010], 0, "copied one byte too many");
        assert_eq!(dma.port_a().counter, 0x4010);
        assert_eq!(dma.port_b().counter, 0x8010);
        assert!(!dma.is_enabled(), "continuous transfer is one-shot");
        assert_eq!(dma.byte_counter(), 0);
        assert_eq!(dma.status() & STATUS_END_OF_BLOCK, STATUS_END_OF_BLOCK);
        assert_eq!(dma.status() & STATUS_TRANSFERRED, STATUS_TRANSFERRED);
    }

    #[test]
    fn disabled_dma_does_nothing() {
        let mut bus = FlatBus::new();
        bus.memory[0x4000] = 0x55;
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        dma.write_port(0xCF);

        assert_eq!(dma.execute(&mut bus), 0);
        assert_eq!(bus.memory[0x8000], 0);
    }

    #[test]
    fn counters_follow_step_and_wrap() {
        let mut bus = FlatBus::new();
        let mut dma = ZxnDma::new();
        // WR0 A->B, A=$0002, length 5
        write_all(&mut dma, &[0x7D, 0x02, 0x00, 0x05, 0x00]);
        dma.write_port(0x04); // WR1: memory, decrement
        dma.write_port(0x20); // WR2: memory, fixed
        write_all(&mut dma, &[0xAD, 0xFE, 0xFF]); // B=$FFFE
        write_all(&mut dma, &[0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 30);
        assert_eq!(dma.port_a().counter, 0x0002u16.wrapping_sub(5));
        assert_eq!(dma.port_b().counter, 0xFFFE);
    }

    #[test]
    fn io_to_io_costs_eight_per_byte() {
        let mut bus = FlatBus::new();
        bus.ports[0x00FE] = Some(0x42);
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x7D, 0xFE, 0x00, 0x04, 0x00]);
        dma.write_port(0x2C); // WR1: I/O, fixed
        dma.write_port(0x28); // WR2: I/O, fixed
        write_all(&mut dma, &[0xAD, 0x5B, 0x00]);
        write_all(&mut dma, &[0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 32);
        assert_eq!(bus.port_writes, vec![(0x005B, 0x42); 4]);
    }

    #[test]
    fn explicit_cycle_length_overrides_default() {
        let mut bus = FlatBus::new();
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x7D, 0x00, 0x40, 0x02, 0x00]);
        write_all(&mut dma, &[0x54, 0b10]); // WR1 + timing: cycle length 2
        write_all(&mut dma, &[0x50, 0b00]); // WR2 + timing: cycle length 4
        assert_eq!(dma.port_a().cycle_length, 2);
        assert_eq!(dma.port_b().cycle_length, 4);
        write_all(&mut dma, &[0xAD, 0x00, 0x80, 0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 12);

        dma.write_port(0xC7);
        assert_eq!(dma.port_a().cycle_length, 0);
        dma.write_port(0xCB);
        assert_eq!(dma.port_b().cycle_length, 0);
    }

    #[test]
    fn b_to_a_copies_from_port_b() {
        let mut bus = FlatBus::new();
        bus.memory[0x9000] = 0x11;
        bus.memory[0x9001] = 0x22;
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x79, 0x00, 0x50, 0x02, 0x00]); // B->A
        write_all(&mut dma, &[0x14, 0x10, 0xAD, 0x00, 0x90, 0xCF, 0x87]);

        dma.execute(&mut bus);
        assert_eq!(&bus.memory[0x5000..0x5002], &[0x11, 0x22]);
    }

    #[test]
    fn zero_length_block_sets_end_but_not_transferred() {
        let mut bus = FlatBus::new();
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x7D, 0x00, 0x40, 0x00, 0x00, 0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 0);
        assert_eq!(dma.status(), STATUS_FIXED | STATUS_END_OF_BLOCK);
        assert!(!dma.is_enabled());

        dma.write_port(0x8B);
        assert_eq!(dma.status(), STATUS_FIXED);
    }

    #[test]
    fn burst_mode_is_a_stub() {
        let mut bus = FlatBus::new();
        bus.memory[0x4000] = 0x99;
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        write_all(&mut dma, &[0xCD, 0x00, 0x80]); // WR4 burst, B=$8000
        write_all(&mut dma, &[0xCF, 0x87]);
        let before = dma.clone();

        assert_eq!(dma.execute(&mut bus), 0);
        assert_eq!(dma, before);
        assert_eq!(bus.memory[0x8000], 0);
    }

    #[test]
    fn prescalar_is_a_stub() {
        let mut bus = FlatBus::new();
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        // WR2 with timing byte announcing a prescalar.
        write_all(&mut dma, &[0x50, 0x23, 0x10]);
        assert_eq!(dma.prescalar(), 0x10);
        assert!(dma.decode_state().is_idle());
        write_all(&mut dma, &[0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 0);
        assert!(dma.is_enabled());

        dma.write_port(0xC3);
        assert_eq!(dma.prescalar(), 0);
        assert!(!dma.is_enabled());
    }

    #[test]
    fn read_mask_rotates_over_set_bits() {
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0x7D, 0x00, 0x40, 0x34, 0x12]);
        dma.write_port(0xBB);
        dma.write_port(0b000_0011);

        let status = dma.status();
        assert_eq!(dma.read_port(), status);
        assert_eq!(dma.read_port(), 0x00); // block counter lo
        assert_eq!(dma.read_port(), status);
        assert_eq!(dma.read_port(), 0x00);
    }

    #[test]
    fn read_sequence_reports_address_counters() {
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        dma.write_port(0xCF);
        dma.write_port(0xBB);
        dma.write_port(0b111_1000);

        assert_eq!(dma.read_port(), 0x00); // A lo
        assert_eq!(dma.read_port(), 0x40); // A hi
        assert_eq!(dma.read_port(), 0x00); // B lo
        assert_eq!(dma.read_port(), 0x80); // B hi
        assert_eq!(dma.read_port(), 0x00); // wraps to A lo

        dma.write_port(0xA7);
        assert_eq!(dma.read_port(), 0x00);
        assert_eq!(dma.read_port(), 0x40);
    }

    #[test]
    fn read_status_command_narrows_mask() {
        let mut dma = ZxnDma::new();
        dma.write_port(0xBF);
        assert_eq!(dma.read_mask(), 0x01);
        assert_eq!(dma.read_port(), dma.status());
        assert_eq!(dma.read_port(), dma.status());
    }

    #[test]
    fn empty_read_mask_returns_zero() {
        let mut dma = ZxnDma::new();
        dma.write_port(0xBB);
        dma.write_port(0x00);
        assert_eq!(dma.read_port(), 0);
    }

    #[test]
    fn unknown_command_is_ignored() {
        let mut dma = ZxnDma::new();
        let before = dma.clone();
        dma.write_port(0xFF);
        assert_eq!(dma, ZxnDma { decode: dma.decode, ..before });
        assert!(dma.decode_state().is_idle());
    }

    #[test]
    fn wr3_enable_bit_and_parameters() {
        let mut dma = ZxnDma::new();
        write_all(&mut dma, &[0xD8, 0x0F, 0xAA]); // enable, mask + match
        assert!(dma.is_enabled());
        assert_eq!(dma.mask_byte, 0x0F);
        assert_eq!(dma.match_byte, 0xAA);
        assert!(dma.decode_state().is_idle());
    }

    #[test]
    fn wr4_interrupt_control_chain() {
        let mut dma = ZxnDma::new();
        // WR4 continuous + int control; control announces pulse and vector.
        write_all(&mut dma, &[0xB1, 0x18, 0x05, 0x40]);
        assert_eq!(dma.interrupt_control, 0x18);
        assert_eq!(dma.pulse_control, 0x05);
        assert_eq!(dma.interrupt_vector, 0x40);
        assert!(dma.decode_state().is_idle());
    }

    #[test]
    fn continue_clears_block_counter_only() {
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        dma.write_port(0xCF);
        dma.byte_counter = 7;
        dma.port_a.counter = 0x4007;
        dma.write_port(0xD3);
        assert_eq!(dma.byte_counter(), 0);
        assert_eq!(dma.port_a().counter, 0x4007);
    }

    #[test]
    fn auto_restart_reloads_counters() {
        let mut bus = FlatBus::new();
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        dma.write_port(0xA2); // WR5 auto-restart
        assert!(dma.auto_restart());
        write_all(&mut dma, &[0xCF, 0x87]);

        assert_eq!(dma.execute(&mut bus), 96);
        assert_eq!(dma.port_a().counter, 0x4000);
        assert_eq!(dma.port_b().counter, 0x8000);

        dma.write_port(0x87);
        assert_eq!(dma.execute(&mut bus), 96);
    }

    #[test]
    fn snapshot_round_trip() {
        for dma in [ZxnDma::new(), {
            let mut dma = ZxnDma::new();
            program_copy(&mut dma);
            write_all(&mut dma, &[0xCF, 0xBB, 0x05, 0x7D, 0x01]);
            dma.read_port();
            dma
        }] {
            let mut w = SnapshotWriter::new();
            dma.save_state(&mut w);
            let bytes = w.into_bytes();

            let mut restored = ZxnDma::new();
            restored.write_port(0x87);
            let mut r = SnapshotReader::new(&bytes);
            restored.load_state(&mut r).unwrap();
            assert_eq!(r.remaining(), 0);
            assert_eq!(restored, dma);
        }
    }

    #[test]
    fn bad_snapshot_leaves_state_untouched() {
        let mut dma = ZxnDma::new();
        program_copy(&mut dma);
        let mut w = SnapshotWriter::new();
        dma.save_state(&mut w);
        let mut bytes = w.into_bytes();
        bytes.truncate(bytes.len() - 3);

        let mut target = ZxnDma::new();
        target.write_port(0x87);
        let before = target.clone();
        assert!(target.load_state(&mut SnapshotReader::new(&bytes)).is_err());
        assert_eq!(target, before);
    }

    #[test]
    fn observable_exposes_decode_state() {
        let mut dma = ZxnDma::new();
        dma.write_port(0x7D);
        assert_eq!(dma.query("decode.register"), Some(Value::from("wr0")));
        assert_eq!(dma.query("decode.pending"), Some(Value::U8(0x78)));
        assert_eq!(dma.query("port_b.step"), Some(Value::I8(1)));
        assert_eq!(dma.query("nope"), None);
        for path in dma.query_paths() {
            assert!(dma.query(path).is_some(), "{path} not answered");
        }
    }
}
