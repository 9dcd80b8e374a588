//! WR6 command bytes.
//!
//! WR6 takes no positional parameters: the byte value itself is the command.
//! Only `ReadMaskFollows` consumes a further byte.

/// A recognised WR6 command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// $C3: disable, default timings, clear auto-restart and read sequence.
    Reset,
    /// $C7
    ResetPortATiming,
    /// $CB
    ResetPortBTiming,
    /// $BF: next read returns the status byte.
    ReadStatus,
    /// $8B: clear end-of-block and transferred flags.
    ReinitializeStatus,
    /// $A7: restart the read sequence at its first enabled counter.
    InitializeReadSequence,
    /// $B3: force ready. No effect, the zxnDMA is always ready.
    ForceReady,
    /// $CF: copy start addresses into the address counters, zero the block
    /// counter.
    Load,
    /// $D3: zero the block counter, keep the address counters.
    Continue,
    /// $87
    Enable,
    /// $83
    Disable,
    /// $BB: next written byte is the read mask.
    ReadMaskFollows,
    /// $AF, $AB, $A3, $B7: interrupt control. Accepted and ignored; the
    /// zxnDMA has no interrupt output.
    Interrupt,
}

impl Command {
    /// Decode a WR6 byte. `None` for bytes the DMA does not recognise.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        let cmd = match value {
            0xC3 => Self::Reset,
            0xC7 => Self::ResetPortATiming,
            0xCB => Self::ResetPortBTiming,
            0xBF => Self::ReadStatus,
            0x8B => Self::ReinitializeStatus,
            0xA7 => Self::InitializeReadSequence,
            0xB3 => Self::ForceReady,
            0xCF => Self::Load,
            0xD3 => Self::Continue,
            0x87 => Self::Enable,
            0x83 => Self::Disable,
            0xBB => Self::ReadMaskFollows,
            0xAF | 0xAB | 0xA3 | 0xB7 => Self::Interrupt,
            _ => return None,
        };
        Some(cmd)
    }
}
