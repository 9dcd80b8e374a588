//! Top-level ZX81 system.
//!
//! # Step order
//!
//! 1. An enabled zxnDMA transfers its whole block (the CPU is held off).
//! 2. The CPU executes one instruction.
//! 3. The ULA advances by the T-states of both, raising NMI/INT.
//! 4. Raised lines go to the CPU before its next instruction.

use emu_core::{Cpu, MasterClock, Observable, PendingInterrupts, Value};
use sinclair_zx81_ula::{CHROMA_PORT, DisplaySnapshot, VideoEvent};
use zilog_z80_dma::ZxnDma;

use crate::bus::Zx81Bus;
use crate::config::{DEFAULT_DMA_PORT, Zx81Config};
use crate::error::MachineError;
use crate::memory::Zx81Memory;
use crate::ports::{Diagnostic, DiagnosticsSink, PortBinding, PortHandler, Severity, SourceLocation};
use crate::snapshot;

/// Undrained video notifications kept; older ones are dropped.
pub const EVENT_BACKLOG: usize = 64;

/// ZX81 system around a host-supplied Z80 core.
pub struct Zx81<C> {
    cpu: C,
    bus: Zx81Bus,
    config: Zx81Config,
    clock: MasterClock,
    tstates: u64,
    interrupts: PendingInterrupts,
    events: Vec<VideoEvent>,
    frames_ready: u64,
}

impl<C: Cpu<Zx81Bus>> Zx81<C> {
    #[must_use]
    pub fn new(config: Zx81Config, cpu: C) -> Self {
        let memory = Zx81Memory::new(&config.rom, config.ram);
        let video = config.video.build(config.ula);
        let bus = Zx81Bus::new(memory, video, config.dma_port);
        Self {
            cpu,
            bus,
            clock: MasterClock::new(config.ula.cpu_frequency_hz),
            config,
            tstates: 0,
            interrupts: PendingInterrupts::default(),
            events: Vec::new(),
            frames_ready: 0,
        }
    }

    /// Run one DMA slot plus one CPU instruction. Returns the T-states used.
    ///
    /// A failing custom port handler does not interrupt the instruction;
    /// its error is returned once the step is complete.
    pub fn step(&mut self) -> Result<u32, MachineError> {
        let mut cycles = 0;
        if let Some(mut dma) = self.bus.dma.take() {
            cycles += dma.execute(&mut self.bus);
            self.bus.dma = Some(dma);
        }

        cycles += self.cpu.step(&mut self.bus);

        let refresh = self.cpu.refresh();
        let vector = self.cpu.interrupt_vector();
        let Zx81Bus { memory, video, .. } = &mut self.bus;
        let memory = &*memory;
        video.execute(
            cycles,
            refresh,
            vector,
            &|addr| memory.read(addr),
            &mut self.interrupts,
        );
        for event in video.take_events() {
            if event == VideoEvent::FrameReady {
                self.frames_ready += 1;
            }
            self.events.push(event);
        }
        if self.events.len() > EVENT_BACKLOG {
            let excess = self.events.len() - EVENT_BACKLOG;
            log::trace!("ZX81: dropping {excess} undrained video events");
            self.events.drain(..excess);
        }

        let lines = self.interrupts.take();
        if lines.nmi {
            self.cpu.nmi();
        }
        if let Some(data_bus) = lines.int {
            self.cpu.interrupt(data_bus);
        }

        self.tstates += u64::from(cycles);

        match self.bus.take_port_error() {
            Some(error) => Err(error.into()),
            None => Ok(cycles),
        }
    }

    /// Step until the ULA completes a frame, or one nominal frame of
    /// T-states has passed without one (FAST mode, no display).
    pub fn run_frame(&mut self) -> Result<u64, MachineError> {
        let budget = self.config.ula.frame_tstates();
        let mut elapsed = 0u64;
        loop {
            let seen = self.frames_ready;
            elapsed += u64::from(self.step()?);
            if self.frames_ready != seen || elapsed >= budget {
                return Ok(elapsed);
            }
        }
    }

    /// Drain video notifications collected since the last call, at most
    /// [`EVENT_BACKLOG`] of the newest.
    pub fn take_events(&mut self) -> Vec<VideoEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn display_snapshot(&self) -> DisplaySnapshot {
        self.bus.display_snapshot()
    }

    /// Install a host port handler.
    ///
    /// Ports owned by the DMA or the Chroma81 interface are refused with an
    /// error diagnostic. Even ports are accepted with a warning: the ULA
    /// still decodes them for sync timing.
    pub fn register_port(
        &mut self,
        binding: PortBinding,
        handler: PortHandler,
        location: &SourceLocation,
        sink: &mut dyn DiagnosticsSink,
    ) -> bool {
        if let PortBinding::Exact(port) = binding {
            let owner = if self.bus.dma_port == Some(port) {
                Some("the DMA controller")
            } else if self.config.ula.chroma81 && port == CHROMA_PORT {
                Some("the Chroma81 interface")
            } else {
                None
            };
            if let Some(owner) = owner {
                sink.report(Diagnostic {
                    severity: Severity::Error,
                    message: format!("{binding} is owned by {owner}"),
                    location: location.clone(),
                });
                return false;
            }
            if port & 0x0001 == 0 {
                sink.report(Diagnostic {
                    severity: Severity::Warning,
                    message: format!("{binding} is also decoded by the ULA (A0 low)"),
                    location: location.clone(),
                });
            }
        }
        self.bus.custom.register(binding, handler, location, sink);
        true
    }

    pub fn unregister_port(&mut self, port: u16) -> bool {
        self.bus.custom.unregister(port)
    }

    /// Serialize RAM, ULA and DMA state.
    #[must_use]
    pub fn save_snapshot(&self) -> Vec<u8> {
        snapshot::save(&self.bus, self.tstates)
    }

    /// Restore a snapshot taken by `save_snapshot`. On error the machine is
    /// unchanged. The video variant and DMA presence follow the snapshot.
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<(), MachineError> {
        let restored = snapshot::restore(data, self.config.ula)?;

        self.tstates = restored.tstates;
        self.bus.memory.replace_ram(restored.ram);
        self.bus.video = restored.video;
        if restored.dma.is_some() && self.bus.dma_port.is_none() {
            self.bus.dma_port = Some(DEFAULT_DMA_PORT);
        }
        self.bus.dma = restored.dma;
        self.interrupts = PendingInterrupts::default();
        self.events.clear();
        log::debug!("ZX81: snapshot restored at T-state {}", self.tstates);
        Ok(())
    }

    /// Reset CPU and peripherals. RAM survives, as on the real machine.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.video = self.config.video.build(self.config.ula);
        if self.bus.dma.is_some() {
            self.bus.dma = Some(ZxnDma::new());
        }
        self.interrupts = PendingInterrupts::default();
        self.events.clear();
    }

    /// T-states since power-on.
    #[must_use]
    pub fn tstates(&self) -> u64 {
        self.tstates
    }

    /// Emulated time since power-on.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.seconds(self.tstates)
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &Zx81Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Zx81Bus {
        &mut self.bus
    }
}

const QUERY_PATHS: &[&str] = &["tstates", "pc"];

/// Machine paths, plus `video.*` and `dma.*` forwarded to the chips.
impl<C: Cpu<Zx81Bus>> Observable for Zx81<C> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("video.") {
            return self.bus.video.query(rest);
        }
        if let Some(rest) = path.strip_prefix("dma.") {
            return self.bus.dma.as_ref()?.query(rest);
        }
        match path {
            "tstates" => Some(self.tstates.into()),
            "pc" => Some(self.cpu.pc().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
