//! Core traits and types for cycle-driven Z80 peripheral emulation.
//!
//! Peripherals are stepped once per CPU instruction with the T-states that
//! instruction (or a DMA burst) consumed. They reach memory and ports only
//! through the bus traits here, raise interrupts through `InterruptSink`,
//! and save/restore through the flat snapshot codec.

mod bus;
mod clock;
mod cpu;
mod observable;
mod ports;
mod snapshot;

pub use bus::{Bus, FlatBus, IoBus};
pub use clock::MasterClock;
pub use cpu::{Cpu, InterruptSink, PendingInterrupts};
pub use observable::{Observable, Value};
pub use ports::PortMap;
pub use snapshot::{SaveState, SnapshotError, SnapshotReader, SnapshotWriter};
