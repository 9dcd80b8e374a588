//! Memory and I/O bus interface.

/// Memory bus interface.
///
/// Components access memory through this trait. The bus handles address
/// decoding and routing to the appropriate device.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte without side effects (debuggers, video fetches).
    fn peek(&self, address: u16) -> u8;

    /// Opcode fetch (M1 cycle).
    ///
    /// Distinct from `read()` because some machines decode M1 specially;
    /// the ZX81 ULA swaps display bytes for NOPs here.
    fn fetch(&mut self, address: u16) -> u8 {
        self.read(address)
    }
}

/// A bus that also has the Z80's separate 16-bit I/O space.
pub trait IoBus: Bus {
    /// Read from an I/O port. `None` means no device drove the data bus;
    /// the caller decides what a floating read returns.
    fn io_read(&mut self, port: u16) -> Option<u8>;

    /// Write to an I/O port.
    fn io_write(&mut self, port: u16, value: u8);
}

/// Flat 64K RAM bus with no I/O devices. Handy for chip-level tests.
pub struct FlatBus {
    pub memory: Vec<u8>,
    /// Bytes returned by `io_read`, indexed by the full 16-bit port.
    pub ports: Vec<Option<u8>>,
    /// Log of `io_write` calls in order.
    pub port_writes: Vec<(u16, u8)>,
}

impl FlatBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: vec![0; 0x10000],
            ports: vec![None; 0x10000],
            port_writes: Vec::new(),
        }
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FlatBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    fn peek(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }
}

impl IoBus for FlatBus {
    fn io_read(&mut self, port: u16) -> Option<u8> {
        self.ports[port as usize]
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.port_writes.push((port, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_defaults_to_read() {
        let mut bus = FlatBus::new();
        bus.write(0x1234, 0x76);
        assert_eq!(bus.fetch(0x1234), 0x76);
        assert_eq!(bus.peek(0x1234), 0x76);
    }

    #[test]
    fn undriven_port_reads_none() {
        let mut bus = FlatBus::new();
        assert_eq!(bus.io_read(0x00FE), None);
        bus.ports[0x00FE] = Some(0x1F);
        assert_eq!(bus.io_read(0x00FE), Some(0x1F));
    }
}
