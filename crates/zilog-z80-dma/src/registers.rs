//! Register file types.

use emu_core::{IoBus, SnapshotError};

/// Default cost of one memory access, in T-states.
pub const MEMORY_CYCLES: u8 = 3;
/// Default cost of one I/O access, in T-states.
pub const IO_CYCLES: u8 = 4;

/// Transfer direction (WR0 bit 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AToB,
    BToA,
}

/// Address counter behaviour after each byte (WR1/WR2 bits 5-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Decrement,
    Increment,
    Fixed,
}

impl AddressMode {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Decrement,
            1 => Self::Increment,
            _ => Self::Fixed,
        }
    }

    /// Counter step: -1, +1 or 0.
    #[must_use]
    pub fn step(self) -> i8 {
        match self {
            Self::Decrement => -1,
            Self::Increment => 1,
            Self::Fixed => 0,
        }
    }
}

/// What a port address refers to (WR1/WR2 bit 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Memory,
    Io,
}

/// WR4 bits 6-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// One byte per bus request.
    Byte,
    /// Hold the bus for the whole block.
    Continuous,
    /// Release the bus between bytes.
    Burst,
}

impl TransferMode {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Byte,
            1 => Self::Continuous,
            // %11 is reserved; the zxnDMA behaves as burst.
            _ => Self::Burst,
        }
    }
}

/// Which write register the decoder is filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRegister {
    Wr0,
    Wr1,
    Wr2,
    Wr3,
    Wr4,
    Wr5,
    Wr6,
}

impl WriteRegister {
    /// Select a register from the first byte of a sequence.
    ///
    /// Bit 7 set: WR3-WR6 by the low two bits. Bit 7 clear with low bits
    /// %00: WR1 (bit 2 set) or WR2. Anything else is WR0.
    #[must_use]
    pub fn select(value: u8) -> Self {
        if value & 0x80 != 0 {
            match value & 0x03 {
                0 => Self::Wr3,
                1 => Self::Wr4,
                2 => Self::Wr5,
                _ => Self::Wr6,
            }
        } else if value & 0x03 == 0 {
            if value & 0x04 != 0 { Self::Wr1 } else { Self::Wr2 }
        } else {
            Self::Wr0
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Wr0 => "wr0",
            Self::Wr1 => "wr1",
            Self::Wr2 => "wr2",
            Self::Wr3 => "wr3",
            Self::Wr4 => "wr4",
            Self::Wr5 => "wr5",
            Self::Wr6 => "wr6",
        }
    }

    pub(crate) fn index(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::Wr0,
            1 => Self::Wr1,
            2 => Self::Wr2,
            3 => Self::Wr3,
            4 => Self::Wr4,
            5 => Self::Wr5,
            6 => Self::Wr6,
            _ => return None,
        })
    }
}

/// Decoder position: the register being filled and which of its optional
/// parameter bytes are still owed.
///
/// `pending` uses each register's own bit positions (for WR0 the same bits
/// that announced the parameters in its first byte). Each parameter byte
/// clears the lowest set bit. When `pending` reaches zero the next byte
/// selects a register again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeState {
    pub register: Option<WriteRegister>,
    pub pending: u8,
}

impl DecodeState {
    /// Waiting for a register-select byte?
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

/// One side of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub start: u16,
    pub mode: AddressMode,
    pub kind: PortKind,
    /// Explicit cycle length, 0 = default timing for the port kind.
    pub cycle_length: u8,
    /// Live address counter.
    pub counter: u16,
}

impl PortConfig {
    pub(crate) const fn new() -> Self {
        Self {
            start: 0,
            mode: AddressMode::Increment,
            kind: PortKind::Memory,
            cycle_length: 0,
            counter: 0,
        }
    }

    /// Apply the WR1/WR2 base byte (kind and address mode).
    pub(crate) fn configure(&mut self, value: u8) {
        self.kind = if value & 0x08 != 0 {
            PortKind::Io
        } else {
            PortKind::Memory
        };
        self.mode = AddressMode::from_bits(value >> 4);
    }

    /// Decode a timing byte's cycle-length field.
    ///
    /// The two bits are inverted: %11 means default timing, otherwise the
    /// cycle length is `1 + (bits ^ 3)` (so %00 = 4, %01 = 3, %10 = 2).
    pub(crate) fn set_timing(&mut self, timing: u8) {
        let bits = timing & 0x03;
        self.cycle_length = if bits == 0x03 { 0 } else { 1 + (bits ^ 0x03) };
    }

    /// T-states for one access on this port.
    #[must_use]
    pub fn byte_cost(&self) -> u8 {
        if self.cycle_length != 0 {
            return self.cycle_length;
        }
        match self.kind {
            PortKind::Memory => MEMORY_CYCLES,
            PortKind::Io => IO_CYCLES,
        }
    }

    pub(crate) fn read<B: IoBus>(&self, bus: &mut B) -> u8 {
        match self.kind {
            PortKind::Memory => bus.read(self.counter),
            // Nobody driving the bus reads as $FF.
            PortKind::Io => bus.io_read(self.counter).unwrap_or(0xFF),
        }
    }

    pub(crate) fn write<B: IoBus>(&self, bus: &mut B, value: u8) {
        match self.kind {
            PortKind::Memory => bus.write(self.counter, value),
            PortKind::Io => bus.io_write(self.counter, value),
        }
    }

    pub(crate) fn advance(&mut self) {
        self.counter = self
            .counter
            .wrapping_add_signed(i16::from(self.mode.step()));
    }
}

pub(crate) fn address_mode_from_u8(value: u8) -> Result<AddressMode, SnapshotError> {
    match value {
        0 => Ok(AddressMode::Decrement),
        1 => Ok(AddressMode::Increment),
        2 => Ok(AddressMode::Fixed),
        _ => Err(SnapshotError::InvalidValue {
            field: "dma.address_mode",
            value: u64::from(value),
        }),
    }
}

pub(crate) fn address_mode_to_u8(mode: AddressMode) -> u8 {
    match mode {
        AddressMode::Decrement => 0,
        AddressMode::Increment => 1,
        AddressMode::Fixed => 2,
    }
}
