//! Pluggable last-resort process name resolution.
//!
//! When every /proc-based path fails (typically blocked by access control),
//! the collector can fall back to an external OS tool. The strategy is a
//! trait so platforms without a usable tool plug in a no-op without touching
//! the collection algorithm.

use std::process::Command;
use tracing::debug;

/// Expensive, last-resort name resolution for a single PID.
pub trait NameLookup: Send + Sync {
    /// Returns the resolved name, or `None` on definitive failure.
    fn lookup(&self, pid: u32) -> Option<String>;
}

/// Resolves names by invoking `ps -p <pid> -o comm=`.
pub struct PsLookup;

impl NameLookup for PsLookup {
    fn lookup(&self, pid: u32) -> Option<String> {
        let output = Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "comm="])
            .output()
            .ok()?;
        if !output.status.success() {
            debug!("ps lookup for pid {} exited with {}", pid, output.status);
            return None;
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Fallback that never resolves anything. Used on platforms without a
/// suitable tool and in tests that must not shell out.
pub struct NoopLookup;

impl NameLookup for NoopLookup {
    fn lookup(&self, _pid: u32) -> Option<String> {
        None
    }
}
