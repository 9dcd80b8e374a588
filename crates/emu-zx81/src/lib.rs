//! Sinclair ZX81 machine core.
//!
//! Wires the ULA timing generator and an optional zxnDMA to 64K of ZX81
//! memory map and a host-supplied Z80 core (anything implementing
//! `emu_core::Cpu<Zx81Bus>`). Everything is counted in CPU T-states at
//! 3.25 MHz; there is no master crystal divider as on the Spectrum.
//!
//! The host can add its own I/O devices through [`Zx81::register_port`];
//! handler failures come back from [`Zx81::step`] as [`MachineError::Port`].

mod bus;
mod config;
mod error;
mod memory;
pub mod ports;
mod snapshot;
mod zx81;

pub use bus::Zx81Bus;
pub use config::{DEFAULT_DMA_PORT, RamSize, Zx81Config};
pub use error::MachineError;
pub use memory::{RAM_BYTES, Zx81Memory};
pub use ports::{
    Diagnostic, DiagnosticsSink, PortAccess, PortBinding, PortError, PortHandler, Severity,
    SourceLocation,
};
pub use zx81::{EVENT_BACKLOG, Zx81};

pub use sinclair_zx81_ula::{DisplayKind, DisplaySnapshot, VideoEvent, VideoVariant};
