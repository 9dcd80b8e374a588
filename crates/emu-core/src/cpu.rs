//! CPU and interrupt-line contracts.

use crate::IoBus;

/// A Z80-family CPU driven one instruction at a time.
///
/// The instruction decoder lives outside this workspace; machines only need
/// to step it, read its refresh register and deliver interrupts.
pub trait Cpu<B: IoBus> {
    /// Execute one instruction. Returns T-states consumed.
    fn step(&mut self, bus: &mut B) -> u32;

    /// Reset the CPU to its initial state.
    fn reset(&mut self);

    /// Signal a maskable interrupt with the given data bus value (IM 2
    /// vector low byte / IM 0 opcode).
    fn interrupt(&mut self, data_bus: u8);

    /// Signal a non-maskable interrupt.
    fn nmi(&mut self);

    /// Current program counter.
    fn pc(&self) -> u16;

    /// Memory refresh register (R).
    fn refresh(&self) -> u8;

    /// Interrupt vector base register (I).
    fn interrupt_vector(&self) -> u8;
}

/// Something that accepts interrupt requests from a peripheral.
pub trait InterruptSink {
    fn raise_interrupt(&mut self, non_maskable: bool, data_bus: u8);
}

/// Interrupt lines latched until the machine hands them to the CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingInterrupts {
    /// Data bus value of a pending maskable interrupt.
    pub int: Option<u8>,
    pub nmi: bool,
}

impl PendingInterrupts {
    /// Take and clear both lines.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl InterruptSink for PendingInterrupts {
    fn raise_interrupt(&mut self, non_maskable: bool, data_bus: u8) {
        if non_maskable {
            self.nmi = true;
        } else {
            self.int = Some(data_bus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_lines_latch_until_taken() {
        let mut lines = PendingInterrupts::default();
        lines.raise_interrupt(false, 0xFF);
        lines.raise_interrupt(true, 0);

        let taken = lines.take();
        assert_eq!(taken.int, Some(0xFF));
        assert!(taken.nmi);
        assert_eq!(lines, PendingInterrupts::default());
    }
}
