//! Scripted stand-in for a Z80 core.
//!
//! Each `step()` performs one scripted bus operation and returns its cost,
//! which is all the ZX81 peripherals can observe of an instruction.

#![allow(dead_code)]

use std::collections::VecDeque;

use emu_core::{Cpu, IoBus};
use emu_zx81::{Zx81, Zx81Config};

#[derive(Debug, Clone, Copy)]
pub enum Op {
    /// Opcode fetch, 4 T-states.
    Fetch(u16),
    /// `OUT (C),r`, 12 T-states.
    Out(u16, u8),
    /// `IN r,(C)`, 12 T-states.
    In(u16),
    /// Burn T-states without touching the bus.
    Idle(u32),
    /// Load R (4 T-states).
    Refresh(u8),
}

#[derive(Debug, Default)]
pub struct ScriptCpu {
    pub script: VecDeque<Op>,
    pub fetched: Vec<u8>,
    pub port_reads: Vec<Option<u8>>,
    pub nmis: usize,
    pub ints: Vec<u8>,
    pub resets: usize,
    pub r: u8,
    pub i: u8,
    pub pc: u16,
}

impl ScriptCpu {
    pub fn new(ops: impl IntoIterator<Item = Op>) -> Self {
        Self {
            script: ops.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl<B: IoBus> Cpu<B> for ScriptCpu {
    fn step(&mut self, bus: &mut B) -> u32 {
        match self.script.pop_front().unwrap_or(Op::Idle(4)) {
            Op::Fetch(addr) => {
                self.pc = addr;
                self.fetched.push(bus.fetch(addr));
                4
            }
            Op::Out(port, value) => {
                bus.io_write(port, value);
                12
            }
            Op::In(port) => {
                self.port_reads.push(bus.io_read(port));
                12
            }
            Op::Idle(cycles) => cycles,
            Op::Refresh(r) => {
                self.r = r;
                4
            }
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.pc = 0;
    }

    fn interrupt(&mut self, data_bus: u8) {
        self.ints.push(data_bus);
    }

    fn nmi(&mut self) {
        self.nmis += 1;
    }

    fn pc(&self) -> u16 {
        self.pc
    }

    fn refresh(&self) -> u8 {
        self.r
    }

    fn interrupt_vector(&self) -> u8 {
        self.i
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn machine(config: Zx81Config, ops: impl IntoIterator<Item = Op>) -> Zx81<ScriptCpu> {
    init_logging();
    Zx81::new(config, ScriptCpu::new(ops))
}

/// Step once per scripted operation, failing the test on any error.
pub fn run_script(zx81: &mut Zx81<ScriptCpu>) -> u64 {
    let mut cycles = 0;
    while !zx81.cpu().script.is_empty() {
        cycles += u64::from(zx81.step().unwrap());
    }
    cycles
}

/// An 8K ROM with the character set's pattern for code $26 at sub-line 0
/// (character set at $1E00, as the real ROM has it).
pub fn rom_with_charset() -> Vec<u8> {
    let mut rom = vec![0u8; 0x2000];
    rom[0x1E00 + 0x26 * 8] = 0b0011_1100;
    rom
}
