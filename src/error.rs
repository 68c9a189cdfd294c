//! Typed error taxonomy for process collection and actions.
//!
//! Per-process failures during a collection pass are classified narrowly so
//! the collector can degrade a single field or record without hiding truly
//! unexpected conditions behind a blanket catch.

use std::io;
use thiserror::Error;

/// Errors surfaced by the collector and the one-shot process actions.
#[derive(Debug, Error)]
pub enum ProcError {
    /// The addressed process does not exist.
    #[error("process {0} does not exist")]
    NotFound(u32),

    /// The OS refused access to the process or one of its accounting files.
    #[error("access denied to process {0}")]
    AccessDenied(u32),

    /// The process vanished between enumeration and query.
    #[error("process {0} vanished during collection")]
    Vanished(u32),

    /// A structural failure that should reach the immediate caller.
    #[error("{0}")]
    Unexpected(String),
}

impl ProcError {
    /// Classify an I/O error from a per-process read.
    ///
    /// `NotFound` on a path we just enumerated means the process exited in
    /// between, which is transient rather than an addressing failure.
    pub fn from_io(pid: u32, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProcError::Vanished(pid),
            io::ErrorKind::PermissionDenied => ProcError::AccessDenied(pid),
            _ => ProcError::Unexpected(format!("pid {}: {}", pid, err)),
        }
    }

    /// True for failures that must never abort a collection pass.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            ProcError::NotFound(_) | ProcError::AccessDenied(_) | ProcError::Vanished(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn classifies_not_found_as_vanished() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(ProcError::from_io(42, &err), ProcError::Vanished(42)));
    }

    #[test]
    fn classifies_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let e = ProcError::from_io(1, &err);
        assert!(matches!(e, ProcError::AccessDenied(1)));
        assert!(e.is_soft());
    }

    #[test]
    fn unexpected_is_not_soft() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "mangled");
        assert!(!ProcError::from_io(7, &err).is_soft());
    }
}
