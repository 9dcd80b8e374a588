//! Host-supplied port handlers.
//!
//! A script engine (or a test) can claim I/O ports the built-in hardware
//! doesn't decode. Handlers may fail; the failure is held at the bus and
//! surfaces as `MachineError::Port` from the step that caused it, so the
//! CPU still sees a complete instruction.

use std::fmt;

use emu_core::PortMap;

pub type PortReader = Box<dyn FnMut(u16) -> Result<u8, String>>;
pub type PortWriter = Box<dyn FnMut(u16, u8) -> Result<(), String>>;

/// Which ports a handler claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortBinding {
    Exact(u16),
    /// Every port nobody claimed exactly.
    Any,
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(port) => write!(f, "port ${port:04X}"),
            Self::Any => write!(f, "wildcard port"),
        }
    }
}

/// Read and/or write callbacks for one binding.
#[derive(Default)]
pub struct PortHandler {
    read: Option<PortReader>,
    write: Option<PortWriter>,
}

impl PortHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_read(mut self, f: impl FnMut(u16) -> Result<u8, String> + 'static) -> Self {
        self.read = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_write(mut self, f: impl FnMut(u16, u8) -> Result<(), String> + 'static) -> Self {
        self.write = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAccess {
    Read,
    Write,
}

impl fmt::Display for PortAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// A port handler reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortError {
    pub port: u16,
    pub access: PortAccess,
    pub message: String,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "custom port ${:04X} {}: {}",
            self.port, self.access, self.message
        )
    }
}

impl std::error::Error for PortError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Where in the host's script a registration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(
            f,
            "{}:{}:{}: {level}: {}",
            self.location.file, self.location.line, self.location.column, self.message
        )
    }
}

/// Receives registration problems.
pub trait DiagnosticsSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticsSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Registered handlers plus the first failure not yet collected.
#[derive(Default)]
pub struct CustomPorts {
    handlers: PortMap<PortHandler>,
    error: Option<PortError>,
}

impl CustomPorts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler. A second handler for the same binding replaces the
    /// first and is reported as a warning.
    pub fn register(
        &mut self,
        binding: PortBinding,
        handler: PortHandler,
        location: &SourceLocation,
        sink: &mut dyn DiagnosticsSink,
    ) {
        let previous = match binding {
            PortBinding::Exact(port) => self.handlers.register(port, handler),
            PortBinding::Any => self.handlers.register_wildcard(handler),
        };
        if previous.is_some() {
            sink.report(Diagnostic {
                severity: Severity::Warning,
                message: format!("{binding} registered twice; previous handler replaced"),
                location: location.clone(),
            });
        }
    }

    pub fn unregister(&mut self, port: u16) -> bool {
        self.handlers.unregister(port).is_some()
    }

    /// `None` if no handler reads this port or the handler failed.
    pub fn read(&mut self, port: u16) -> Option<u8> {
        let reader = self.handlers.resolve_mut(port)?.read.as_mut()?;
        match reader(port) {
            Ok(value) => Some(value),
            Err(message) => {
                self.fail(port, PortAccess::Read, message);
                None
            }
        }
    }

    /// Returns whether a handler took the write.
    pub fn write(&mut self, port: u16, value: u8) -> bool {
        let Some(writer) = self
            .handlers
            .resolve_mut(port)
            .and_then(|handler| handler.write.as_mut())
        else {
            return false;
        };
        if let Err(message) = writer(port, value) {
            self.fail(port, PortAccess::Write, message);
        }
        true
    }

    fn fail(&mut self, port: u16, access: PortAccess, message: String) {
        let error = PortError {
            port,
            access,
            message,
        };
        log::warn!("{error}");
        // Keep the first failure of the step.
        self.error.get_or_insert(error);
    }

    pub fn take_error(&mut self) -> Option<PortError> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> SourceLocation {
        SourceLocation::new("boot.script", 3, 7)
    }

    #[test]
    fn exact_handler_beats_wildcard() {
        let mut ports = CustomPorts::new();
        let mut sink = Vec::new();
        ports.register(
            PortBinding::Any,
            PortHandler::new().on_read(|_| Ok(0x11)),
            &here(),
            &mut sink,
        );
        ports.register(
            PortBinding::Exact(0x1234),
            PortHandler::new().on_read(|port| Ok((port >> 8) as u8)),
            &here(),
            &mut sink,
        );

        assert_eq!(ports.read(0x1234), Some(0x12));
        assert_eq!(ports.read(0x5678), Some(0x11));
        assert!(sink.is_empty());
    }

    #[test]
    fn failures_are_wrapped_with_the_port() {
        let mut ports = CustomPorts::new();
        let mut sink = Vec::new();
        ports.register(
            PortBinding::Exact(0x00CF),
            PortHandler::new()
                .on_read(|_| Err("no such device".to_string()))
                .on_write(|_, _| Err("read only".to_string())),
            &here(),
            &mut sink,
        );

        assert_eq!(ports.read(0x00CF), None);
        assert!(ports.write(0x00CF, 1));
        let error = ports.take_error().unwrap();
        assert_eq!(error.to_string(), "custom port $00CF read: no such device");
        assert_eq!(ports.take_error(), None);
    }

    #[test]
    fn duplicate_registration_warns() {
        let mut ports = CustomPorts::new();
        let mut sink = Vec::new();
        ports.register(PortBinding::Exact(0x10), PortHandler::new(), &here(), &mut sink);
        ports.register(PortBinding::Exact(0x10), PortHandler::new(), &here(), &mut sink);

        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].severity, Severity::Warning);
        assert_eq!(
            sink[0].to_string(),
            "boot.script:3:7: warning: port $0010 registered twice; previous handler replaced"
        );
    }

    #[test]
    fn write_only_handler_does_not_answer_reads() {
        let mut ports = CustomPorts::new();
        let mut sink = Vec::new();
        ports.register(
            PortBinding::Exact(0x20),
            PortHandler::new().on_write(|_, _| Ok(())),
            &here(),
            &mut sink,
        );
        assert_eq!(ports.read(0x20), None);
        assert!(ports.write(0x20, 0));
        assert!(!ports.write(0x21, 0));
    }
}
