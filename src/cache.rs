//! Snapshot coordination between polling consumers and the collector.
//!
//! `SnapshotCache` owns the most recent successfully collected snapshot, its
//! capture timestamp, and the single-pass guard flag. It answers "give me
//! current data" without re-collecting while the snapshot is fresh, and
//! without ever blocking a caller on a pass that is already running
//! elsewhere.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::collector::Collector;
use crate::error::ProcError;
use crate::snapshot::Snapshot;

/// Clears the guard flag when a pass ends, success or failure, so a crashed
/// pass cannot wedge the cache into "always busy".
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SnapshotCache {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    collecting: AtomicBool,
    passes: AtomicU64,
    freshness: Duration,
}

impl SnapshotCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            snapshot: RwLock::new(None),
            collecting: AtomicBool::new(false),
            passes: AtomicU64::new(0),
            freshness,
        }
    }

    /// Serve current process data.
    ///
    /// Fresh snapshot: returned as-is. Pass already running: the last known
    /// snapshot (possibly stale, empty before the first-ever pass) is
    /// returned immediately. Otherwise one collection pass runs on the
    /// calling thread. Partial OS failures are absorbed inside the pass; only
    /// a structural enumeration failure propagates, and the previously
    /// published snapshot stays servable.
    pub fn get_process_data(&self, collector: &Collector) -> Result<Arc<Snapshot>, ProcError> {
        if let Some(snapshot) = self.current() {
            if snapshot.captured_at.elapsed() < self.freshness {
                return Ok(snapshot);
            }
        }

        if self
            .collecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("collection already in progress, serving last snapshot");
            return Ok(self.last_or_empty());
        }
        let _guard = PassGuard(&self.collecting);

        self.passes.fetch_add(1, Ordering::Relaxed);
        let records = match collector.collect_pass() {
            Ok(records) => records,
            Err(e) => {
                warn!("collection pass failed: {}", e);
                return Err(e);
            }
        };

        let snapshot = Arc::new(Snapshot::new(records));
        *self.snapshot.write().expect("snapshot lock poisoned") = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Last published snapshot, if any pass ever succeeded.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    /// Number of collection passes triggered through this cache, for health
    /// reporting and freshness tests.
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    fn last_or_empty(&self) -> Arc<Snapshot> {
        self.current().unwrap_or_else(|| Arc::new(Snapshot::empty()))
    }
}
