//! Running statistics about collection passes for the /health endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Min/avg/max over all recorded samples plus the most recent one.
#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Thread-safe aggregation of pass metrics.
#[derive(Default)]
pub struct HealthStats {
    snapshot_size: Mutex<RunningStat>,
    pass_duration_seconds: Mutex<RunningStat>,
    requests_total: AtomicU64,
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_pass(&self, records: u64, duration_seconds: f64) {
        if let Ok(mut stat) = self.snapshot_size.lock() {
            stat.add(records as f64);
        }
        if let Ok(mut stat) = self.pass_duration_seconds.lock() {
            stat.add(duration_seconds);
        }
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain-text table for the /health endpoint.
    pub fn render_table(&self, passes: u64, cpu_cache: usize, name_cache: usize) -> String {
        let size = self
            .snapshot_size
            .lock()
            .map(|s| *s)
            .unwrap_or_default();
        let duration = self
            .pass_duration_seconds
            .lock()
            .map(|s| *s)
            .unwrap_or_default();

        let mut out = String::new();
        writeln!(
            out,
            "{:22} | {:>10} | {:>10} | {:>10} | {:>10}",
            "metric", "current", "average", "max", "min"
        )
        .ok();
        writeln!(out, "{}", "-".repeat(74)).ok();
        writeln!(
            out,
            "{:22} | {:>10.0} | {:>10.1} | {:>10.0} | {:>10.0}",
            "snapshot size",
            size.last,
            size.avg(),
            size.max,
            size.min
        )
        .ok();
        writeln!(
            out,
            "{:22} | {:>10.3} | {:>10.3} | {:>10.3} | {:>10.3}",
            "pass duration (s)",
            duration.last,
            duration.avg(),
            duration.max,
            duration.min
        )
        .ok();
        writeln!(out).ok();
        writeln!(out, "collection passes: {}", passes).ok();
        writeln!(
            out,
            "requests served:   {}",
            self.requests_total.load(Ordering::Relaxed)
        )
        .ok();
        writeln!(out, "cpu cache entries:  {}", cpu_cache).ok();
        writeln!(out, "name cache entries: {}", name_cache).ok();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stat_tracks_extremes() {
        let mut stat = RunningStat::default();
        stat.add(3.0);
        stat.add(1.0);
        stat.add(2.0);
        assert_eq!(stat.min, 1.0);
        assert_eq!(stat.max, 3.0);
        assert_eq!(stat.last, 2.0);
        assert!((stat.avg() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn render_includes_counters() {
        let stats = HealthStats::new();
        stats.record_pass(12, 0.034);
        stats.record_request();
        let table = stats.render_table(5, 10, 3);
        assert!(table.contains("collection passes: 5"));
        assert!(table.contains("cpu cache entries:  10"));
        assert!(table.contains("snapshot size"));
    }
}
