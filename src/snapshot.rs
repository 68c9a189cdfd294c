//! Snapshot data model for one collection pass.
//!
//! A `Snapshot` is the complete, immutable-once-published result of a single
//! walk over the OS process table. It is handed to readers as an
//! `Arc<Snapshot>` and replaced wholesale; it is never mutated in place.

use serde::Serialize;
use std::time::Instant;

/// Sentinel used when a process name cannot be resolved at all.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Sentinel used when the run state cannot be read.
pub const UNKNOWN_STATE: &str = "unknown";

/// Per-process resource usage, rebuilt on every collection pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Never empty; falls back to [`UNKNOWN_NAME`].
    pub name: String,
    /// OS run state ("running", "sleeping", "zombie", ...), or [`UNKNOWN_STATE`].
    pub state: String,
    /// Percent of one core since the last CPU accounting update; 0.0 when unknown.
    pub cpu_percent: f64,
    /// Resident set size in megabytes; 0.0 when unreadable.
    pub memory_mb: f64,
    /// Process creation time, seconds since the epoch; 0 when unavailable.
    pub start_time: u64,
}

/// One published collection pass: records in OS enumeration order plus a
/// capture timestamp for freshness decisions.
#[derive(Debug)]
pub struct Snapshot {
    pub records: Vec<ProcessRecord>,
    pub captured_at: Instant,
}

impl Snapshot {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self {
            records,
            captured_at: Instant::now(),
        }
    }

    /// Placeholder returned to callers before the first pass has completed.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Best-effort per-field details for a single process.
///
/// `None` in any field means the OS denied access to that field; the lookup
/// as a whole only fails when the process cannot be addressed at all.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetails {
    pub start_time: Option<u64>,
    pub user: Option<String>,
    pub threads: Option<u32>,
}
