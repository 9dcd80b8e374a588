use std::fmt;

use emu_core::SnapshotError;

use crate::ports::PortError;

/// Errors surfaced by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    Snapshot(SnapshotError),
    Port(PortError),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot(e) => write!(f, "snapshot: {e}"),
            Self::Port(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MachineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Snapshot(e) => Some(e),
            Self::Port(e) => Some(e),
        }
    }
}

impl From<SnapshotError> for MachineError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

impl From<PortError> for MachineError {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}
