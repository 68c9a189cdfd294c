//! Collection pass over the OS process table.
//!
//! One invocation of [`Collector::collect_pass`] walks every visible process
//! once and produces a complete record list. Per-process failures degrade the
//! single record; only a failure to enumerate the table at all aborts the
//! pass. CPU accounting is throttled to its own cadence because tick-delta
//! sampling is the expensive step; in between, per-PID values come from the
//! CPU cache.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use rayon::prelude::*;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::ProcError;
use crate::lookup::NameLookup;
use crate::procfs::{state_label, ProcReader, ProcStat};
use crate::snapshot::{ProcessRecord, UNKNOWN_NAME, UNKNOWN_STATE};

/// Last CPU sample for one PID: the monotonic tick counter plus the percent
/// computed from the previous delta.
#[derive(Debug, Clone, Copy)]
pub struct CpuEntry {
    total_ticks: u64,
    sampled_at: Instant,
    cpu_percent: f64,
}

/// Tuning knobs for a collector instance.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Minimum interval between expensive CPU accounting updates.
    pub cpu_refresh: Duration,
    /// CPU cache entries tolerated before stale PIDs are pruned.
    pub cpu_cache_max: usize,
    /// Name cache entries tolerated before stale PIDs are pruned.
    pub name_cache_max: usize,
    /// Hard cap on processes per pass; `None` scans everything.
    pub max_processes: Option<usize>,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            cpu_refresh: Duration::from_secs(5),
            cpu_cache_max: 500,
            name_cache_max: 200,
            max_processes: None,
        }
    }
}

/// Walks the process table and reconciles per-PID CPU deltas and resolved
/// names across passes. The two caches are the only state that outlives a
/// pass besides the published snapshot itself.
pub struct Collector {
    reader: ProcReader,
    lookup: Box<dyn NameLookup>,
    options: CollectorOptions,
    cpu_cache: RwLock<HashMap<u32, CpuEntry>>,
    name_cache: RwLock<HashMap<u32, String>>,
    last_cpu_update: Mutex<Option<Instant>>,
}

impl Collector {
    pub fn new(reader: ProcReader, lookup: Box<dyn NameLookup>, options: CollectorOptions) -> Self {
        Self {
            reader,
            lookup,
            options,
            cpu_cache: RwLock::new(HashMap::new()),
            name_cache: RwLock::new(HashMap::new()),
            last_cpu_update: Mutex::new(None),
        }
    }

    pub fn reader(&self) -> &ProcReader {
        &self.reader
    }

    /// Current CPU cache population, for health reporting.
    pub fn cpu_cache_len(&self) -> usize {
        self.cpu_cache.read().expect("cpu_cache read lock poisoned").len()
    }

    /// Current name cache population, for health reporting.
    pub fn name_cache_len(&self) -> usize {
        self.name_cache
            .read()
            .expect("name_cache read lock poisoned")
            .len()
    }

    /// Run one full collection pass.
    ///
    /// Returns the complete record list in enumeration order. Errors only
    /// when the process table itself cannot be enumerated.
    pub fn collect_pass(&self) -> Result<Vec<ProcessRecord>, ProcError> {
        let start = Instant::now();
        let cpu_due = self
            .last_cpu_update
            .lock()
            .expect("last_cpu_update lock poisoned")
            .map_or(true, |t| t.elapsed() >= self.options.cpu_refresh);

        let mut pids = self.reader.list_pids().map_err(|e| {
            ProcError::Unexpected(format!(
                "cannot enumerate {}: {}",
                self.reader.root().display(),
                e
            ))
        })?;
        if let Some(max) = self.options.max_processes {
            pids.truncate(max);
        }

        let records: Vec<ProcessRecord> = pids
            .par_iter()
            .filter_map(|&pid| self.collect_one(pid, cpu_due))
            .collect();

        if cpu_due {
            *self
                .last_cpu_update
                .lock()
                .expect("last_cpu_update lock poisoned") = Some(Instant::now());
            let active: HashSet<u32> = records.iter().map(|r| r.pid).collect();
            self.prune_caches(&active);
        }

        debug!(
            "collection pass: {} of {} processes, cpu_due={}, {:.2}ms",
            records.len(),
            pids.len(),
            cpu_due,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(records)
    }

    /// Build one record, failing soft on every secondary field.
    ///
    /// A process is dropped only when it vanished mid-pass or when nothing
    /// usable beyond the bare PID could be read.
    fn collect_one(&self, pid: u32, cpu_due: bool) -> Option<ProcessRecord> {
        let stat = match self.reader.read_stat(pid) {
            Ok(s) => Some(s),
            Err(e) => {
                match ProcError::from_io(pid, &e) {
                    // Race between enumeration and query: the process exited.
                    ProcError::Vanished(_) if !self.reader.pid_dir(pid).exists() => return None,
                    err => debug!("stat unreadable for pid {}: {}", pid, err),
                }
                None
            }
        };

        let cheap_name = stat
            .as_ref()
            .map(|s| s.name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| self.cheap_name(pid));
        let state = self.resolve_state(pid, stat.as_ref());

        // The keep/skip decision comes before the expensive lookup so that a
        // pid whose directory outlived the process cannot churn the name
        // cache with entries for something already dead.
        if stat.is_none() && state == UNKNOWN_STATE && cheap_name.is_none() && !self.name_cached(pid)
        {
            debug!("skipping pid {}: nothing enumerable beyond the pid", pid);
            return None;
        }

        let name = match cheap_name {
            Some(name) => name,
            None => self.fallback_name(pid),
        };

        // Missing memory info degrades to 0.0; it never drops the record.
        let memory_mb = stat
            .as_ref()
            .map(|s| self.reader.rss_mb(s.rss_pages))
            .unwrap_or(0.0);
        let start_time = stat
            .as_ref()
            .map(|s| self.reader.start_time_epoch(s.start_ticks))
            .unwrap_or(0);

        let cpu_percent = self.resolve_cpu(pid, stat.as_ref(), cpu_due);

        Some(ProcessRecord {
            pid,
            name,
            state,
            cpu_percent,
            memory_mb,
            start_time,
        })
    }

    /// Cheap name sources after the bulk stat field: comm, then cmdline.
    fn cheap_name(&self, pid: u32) -> Option<String> {
        if let Ok(name) = self.reader.read_comm(pid) {
            if !name.is_empty() {
                return Some(name);
            }
        }
        if let Ok(Some(name)) = self.reader.read_cmdline_name(pid) {
            if !name.is_empty() {
                return Some(name);
            }
        }
        None
    }

    fn name_cached(&self, pid: u32) -> bool {
        self.name_cache
            .read()
            .expect("name_cache read lock poisoned")
            .contains_key(&pid)
    }

    /// Last resort when every cheap source failed: the name cache, then the
    /// pluggable OS-tool lookup. The lookup result is cached even when it
    /// definitively fails, so the same PID is not retried every pass.
    fn fallback_name(&self, pid: u32) -> String {
        if let Some(cached) = self
            .name_cache
            .read()
            .expect("name_cache read lock poisoned")
            .get(&pid)
        {
            return cached.clone();
        }
        let resolved = self
            .lookup
            .lookup(pid)
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        self.name_cache
            .write()
            .expect("name_cache write lock poisoned")
            .insert(pid, resolved.clone());
        resolved
    }

    fn resolve_state(&self, pid: u32, stat: Option<&ProcStat>) -> String {
        if let Some(s) = stat {
            return state_label(s.state).to_string();
        }
        // Status line format: "State:\tS (sleeping)".
        match self.reader.read_status_field(pid, "State") {
            Ok(Some(value)) => value
                .chars()
                .next()
                .map(state_label)
                .unwrap_or(UNKNOWN_STATE)
                .to_string(),
            _ => UNKNOWN_STATE.to_string(),
        }
    }

    /// CPU percent for one PID.
    ///
    /// On due passes the tick counter is sampled and the percent is the delta
    /// against the cached sample; the first sighting of a PID yields 0.0.
    /// Off-cadence passes and failed samples reuse the cached percent.
    fn resolve_cpu(&self, pid: u32, stat: Option<&ProcStat>, cpu_due: bool) -> f64 {
        if !cpu_due {
            return self.cached_cpu(pid);
        }
        let Some(stat) = stat else {
            return self.cached_cpu(pid);
        };

        let now = Instant::now();
        let mut cpu_percent = 0.0;
        {
            let cache = self.cpu_cache.read().expect("cpu_cache read lock poisoned");
            if let Some(entry) = cache.get(&pid) {
                let dt = now.duration_since(entry.sampled_at).as_secs_f64();
                if dt > 0.0 {
                    let delta = stat.total_ticks.saturating_sub(entry.total_ticks);
                    let cpu_seconds = delta as f64 / self.reader.clock_ticks() as f64;
                    cpu_percent = (cpu_seconds / dt) * 100.0;
                }
            }
        }

        self.cpu_cache
            .write()
            .expect("cpu_cache write lock poisoned")
            .insert(
                pid,
                CpuEntry {
                    total_ticks: stat.total_ticks,
                    sampled_at: now,
                    cpu_percent,
                },
            );
        cpu_percent
    }

    fn cached_cpu(&self, pid: u32) -> f64 {
        self.cpu_cache
            .read()
            .expect("cpu_cache read lock poisoned")
            .get(&pid)
            .map(|e| e.cpu_percent)
            .unwrap_or(0.0)
    }

    /// Opportunistic eviction: only runs on due passes and only once a cache
    /// exceeds its bound, retaining PIDs seen in the current pass.
    fn prune_caches(&self, active: &HashSet<u32>) {
        {
            let mut cpu = self
                .cpu_cache
                .write()
                .expect("cpu_cache write lock poisoned");
            if cpu.len() > self.options.cpu_cache_max {
                let before = cpu.len();
                cpu.retain(|pid, _| active.contains(pid));
                debug!("pruned CPU cache: {} -> {} entries", before, cpu.len());
            }
        }
        let mut names = self
            .name_cache
            .write()
            .expect("name_cache write lock poisoned");
        if names.len() > self.options.name_cache_max {
            let before = names.len();
            names.retain(|pid, _| active.contains(pid));
            debug!("pruned name cache: {} -> {} entries", before, names.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::NoopLookup;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fake_proc() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("stat"), "btime 1700000000\n").unwrap();
        dir
    }

    fn stat_line(pid: u32, name: &str, ticks: u64) -> String {
        format!(
            "{pid} ({name}) S 1 {pid} {pid} 0 -1 4194304 100 0 0 0 {ticks} 0 0 0 20 0 1 0 500 1000000 256 18446744073709551615 0 0 0 0 0 0 0"
        )
    }

    fn write_stat(root: &Path, pid: u32, name: &str, ticks: u64) {
        let pid_dir = root.join(pid.to_string());
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat_line(pid, name, ticks)).unwrap();
    }

    fn collector(root: &Path, options: CollectorOptions) -> Collector {
        Collector::new(ProcReader::new(root), Box::new(NoopLookup), options)
    }

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        answer: Option<&'static str>,
    }

    impl NameLookup for CountingLookup {
        fn lookup(&self, _pid: u32) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map(|s| s.to_string())
        }
    }

    #[test]
    fn pass_produces_records_with_memory_and_state() {
        let dir = fake_proc();
        write_stat(dir.path(), 10, "worker", 0);
        let c = collector(dir.path(), CollectorOptions::default());

        let records = c.collect_pass().unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.pid, 10);
        assert_eq!(r.name, "worker");
        assert_eq!(r.state, "sleeping");
        assert!(r.memory_mb > 0.0);
        assert!(r.start_time > 1700000000);
    }

    #[test]
    fn missing_stat_keeps_record_with_zero_memory() {
        let dir = fake_proc();
        // Only a status file is readable: memory degrades to 0.0, the record stays.
        let pid_dir = dir.path().join("20");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("status"), "Name:\tghost\nState:\tS (sleeping)\nThreads:\t2\n").unwrap();
        fs::write(pid_dir.join("comm"), "ghost\n").unwrap();

        let c = collector(dir.path(), CollectorOptions::default());
        let records = c.collect_pass().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ghost");
        assert_eq!(records[0].state, "sleeping");
        assert_eq!(records[0].memory_mb, 0.0);
        assert_eq!(records[0].cpu_percent, 0.0);
        assert_eq!(records[0].start_time, 0);
    }

    #[test]
    fn bare_pid_directory_is_skipped() {
        let dir = fake_proc();
        fs::create_dir_all(dir.path().join("30")).unwrap();

        let c = collector(dir.path(), CollectorOptions::default());
        assert!(c.collect_pass().unwrap().is_empty());
    }

    #[test]
    fn skipped_pids_never_reach_the_lookup_or_the_name_cache() {
        let dir = fake_proc();
        // A directory that outlived its process: no accounting file readable.
        fs::create_dir_all(dir.path().join("31")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Collector::new(
            ProcReader::new(dir.path()),
            Box::new(CountingLookup {
                calls: calls.clone(),
                answer: Some("never-asked"),
            }),
            CollectorOptions::default(),
        );

        for _ in 0..3 {
            assert!(c.collect_pass().unwrap().is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.name_cache_len(), 0);
    }

    #[test]
    fn cpu_sampling_is_throttled_between_due_passes() {
        let dir = fake_proc();
        write_stat(dir.path(), 40, "busy", 100);
        let c = collector(
            dir.path(),
            CollectorOptions {
                cpu_refresh: Duration::from_secs(3600),
                ..Default::default()
            },
        );

        // First pass is always due and seeds the cache at 0.0.
        let first = c.collect_pass().unwrap();
        assert_eq!(first[0].cpu_percent, 0.0);
        let seeded = c.cpu_cache.read().unwrap()[&40];

        // The process burns CPU, but the next pass is off-cadence: the cached
        // sample must be reused untouched.
        write_stat(dir.path(), 40, "busy", 5000);
        let second = c.collect_pass().unwrap();
        assert_eq!(second[0].cpu_percent, 0.0);
        let after = c.cpu_cache.read().unwrap()[&40];
        assert_eq!(after.total_ticks, seeded.total_ticks);
    }

    #[test]
    fn due_pass_computes_delta_percent() {
        let dir = fake_proc();
        write_stat(dir.path(), 50, "busy", 100);
        let c = collector(
            dir.path(),
            CollectorOptions {
                cpu_refresh: Duration::ZERO,
                ..Default::default()
            },
        );

        c.collect_pass().unwrap();
        write_stat(dir.path(), 50, "busy", 100 + ProcReader::new(dir.path()).clock_ticks());
        std::thread::sleep(Duration::from_millis(20));

        let records = c.collect_pass().unwrap();
        assert!(
            records[0].cpu_percent > 0.0,
            "one full tick-second over a short interval must register"
        );
    }

    #[test]
    fn failed_cpu_sample_falls_back_to_cached_value() {
        let dir = fake_proc();
        write_stat(dir.path(), 60, "flaky", 100);
        let c = collector(
            dir.path(),
            CollectorOptions {
                cpu_refresh: Duration::ZERO,
                ..Default::default()
            },
        );
        c.collect_pass().unwrap();

        // Force a known cached percent, then make the stat file unreadable.
        c.cpu_cache.write().unwrap().insert(
            60,
            CpuEntry {
                total_ticks: 100,
                sampled_at: Instant::now(),
                cpu_percent: 12.5,
            },
        );
        let pid_dir = dir.path().join("60");
        fs::remove_file(pid_dir.join("stat")).unwrap();
        fs::write(pid_dir.join("comm"), "flaky\n").unwrap();
        fs::write(pid_dir.join("status"), "State:\tR (running)\n").unwrap();

        let records = c.collect_pass().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cpu_percent, 12.5);
    }

    #[test]
    fn cpu_cache_is_pruned_past_its_bound() {
        let dir = fake_proc();
        for pid in 1..=30 {
            write_stat(dir.path(), pid, "churn", 0);
        }
        let c = collector(
            dir.path(),
            CollectorOptions {
                cpu_refresh: Duration::ZERO,
                cpu_cache_max: 10,
                ..Default::default()
            },
        );
        c.collect_pass().unwrap();
        assert_eq!(c.cpu_cache_len(), 30);

        // Most PIDs churn away; the next due pass must settle the cache back
        // to the survivors.
        for pid in 6..=30 {
            fs::remove_dir_all(dir.path().join(pid.to_string())).unwrap();
        }
        c.collect_pass().unwrap();
        assert_eq!(c.cpu_cache_len(), 5);
    }

    #[test]
    fn name_cache_is_pruned_past_its_bound() {
        let dir = fake_proc();
        // Processes whose every cheap name source fails, forcing the fallback.
        for pid in 1..=20 {
            let pid_dir = dir.path().join(pid.to_string());
            fs::create_dir_all(&pid_dir).unwrap();
            fs::write(pid_dir.join("status"), "State:\tS (sleeping)\n").unwrap();
        }
        let lookup = Box::new(CountingLookup {
            calls: Arc::new(AtomicUsize::new(0)),
            answer: Some("recovered"),
        });
        let c = Collector::new(
            ProcReader::new(dir.path()),
            lookup,
            CollectorOptions {
                cpu_refresh: Duration::ZERO,
                name_cache_max: 8,
                ..Default::default()
            },
        );
        c.collect_pass().unwrap();
        assert_eq!(c.name_cache_len(), 20);

        for pid in 4..=20 {
            fs::remove_dir_all(dir.path().join(pid.to_string())).unwrap();
        }
        c.collect_pass().unwrap();
        assert_eq!(c.name_cache_len(), 3);
    }

    #[test]
    fn expensive_lookup_runs_once_per_pid() {
        let dir = fake_proc();
        let pid_dir = dir.path().join("70");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("status"), "State:\tS (sleeping)\n").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Collector::new(
            ProcReader::new(dir.path()),
            Box::new(CountingLookup {
                calls: calls.clone(),
                answer: Some("resolved-by-tool"),
            }),
            CollectorOptions {
                cpu_refresh: Duration::ZERO,
                ..Default::default()
            },
        );

        let first = c.collect_pass().unwrap();
        assert_eq!(first[0].name, "resolved-by-tool");
        let second = c.collect_pass().unwrap();
        assert_eq!(second[0].name, "resolved-by-tool");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second pass must hit the cache");
    }

    #[test]
    fn definitive_lookup_failure_is_cached_as_unknown() {
        let dir = fake_proc();
        let pid_dir = dir.path().join("80");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("status"), "State:\tS (sleeping)\n").unwrap();

        let lookup = CountingLookup {
            calls: Arc::new(AtomicUsize::new(0)),
            answer: None,
        };
        let c = Collector::new(
            ProcReader::new(dir.path()),
            Box::new(lookup),
            CollectorOptions {
                cpu_refresh: Duration::from_secs(3600),
                ..Default::default()
            },
        );

        let first = c.collect_pass().unwrap();
        assert_eq!(first[0].name, UNKNOWN_NAME);
        c.collect_pass().unwrap();
        assert_eq!(
            c.name_cache.read().unwrap().get(&80).map(String::as_str),
            Some(UNKNOWN_NAME)
        );
    }

    #[test]
    fn enumeration_failure_aborts_the_pass() {
        let missing = std::env::temp_dir().join("procsnap-agent-no-such-root");
        let c = collector(&missing, CollectorOptions::default());
        assert!(matches!(c.collect_pass(), Err(ProcError::Unexpected(_))));
    }

    #[test]
    fn max_processes_bounds_the_walk() {
        let dir = fake_proc();
        for pid in 1..=10 {
            write_stat(dir.path(), pid, "p", 0);
        }
        let c = collector(
            dir.path(),
            CollectorOptions {
                max_processes: Some(4),
                ..Default::default()
            },
        );
        assert_eq!(c.collect_pass().unwrap().len(), 4);
    }
}
