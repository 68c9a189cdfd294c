//! System-wide CPU sampling, decoupled from request cadence.
//!
//! `SystemCpuSampler` owns its own cadence: a periodic task calls
//! [`SystemCpuSampler::sample`] and the resulting percent lands in a
//! single-slot cell that any consumer reads without blocking. It is
//! intentionally independent of the per-process collector.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::ProcError;

/// Aggregate CPU time counters from the first line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Idle plus I/O wait: time the CPU spent doing no work.
    fn inactive(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Parse the aggregate "cpu " line of a /proc-style stat file.
pub fn read_cpu_times(root: &Path) -> Result<CpuTimes, ProcError> {
    let content = fs::read_to_string(root.join("stat"))
        .map_err(|e| ProcError::Unexpected(format!("cannot read {}/stat: {}", root.display(), e)))?;
    for line in content.lines() {
        // "cpu0" etc. are per-core; only the aggregate line matters here.
        let Some(rest) = line.strip_prefix("cpu ") else {
            continue;
        };
        return parse_cpu_line(rest)
            .ok_or_else(|| ProcError::Unexpected("malformed aggregate cpu line".to_string()));
    }
    Err(ProcError::Unexpected(format!(
        "no aggregate cpu line in {}/stat",
        root.display()
    )))
}

fn parse_cpu_line(rest: &str) -> Option<CpuTimes> {
    let fields: Vec<u64> = rest
        .split_whitespace()
        .map(|v| v.parse().unwrap_or(0))
        .collect();
    if fields.len() < 7 {
        return None;
    }
    Some(CpuTimes {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
        steal: fields.get(7).copied().unwrap_or(0),
    })
}

/// Delta-based system CPU percent publisher.
pub struct SystemCpuSampler {
    previous: Mutex<Option<CpuTimes>>,
    percent: RwLock<f64>,
}

impl SystemCpuSampler {
    pub fn new() -> Self {
        Self {
            previous: Mutex::new(None),
            percent: RwLock::new(0.0),
        }
    }

    /// Take one sample and publish the busy percent since the previous one.
    /// The first sample only seeds the baseline and publishes 0.0.
    pub fn sample(&self, root: &Path) -> Result<f64, ProcError> {
        let current = read_cpu_times(root)?;

        let mut prev_guard = self.previous.lock().expect("cpu sampler lock poisoned");
        let percent = match prev_guard.as_ref() {
            Some(previous) => {
                let delta_total = current.total().saturating_sub(previous.total());
                let delta_inactive = current.inactive().saturating_sub(previous.inactive());
                if delta_total > 0 {
                    (delta_total - delta_inactive) as f64 / delta_total as f64 * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        *prev_guard = Some(current);
        drop(prev_guard);

        *self.percent.write().expect("cpu percent cell poisoned") = percent;
        debug!("system cpu sample: {:.2}%", percent);
        Ok(percent)
    }

    /// Last published percent; never blocks on an in-flight sample.
    pub fn current(&self) -> f64 {
        *self.percent.read().expect("cpu percent cell poisoned")
    }
}

impl Default for SystemCpuSampler {
    fn default() -> Self {
        Self::new()
    }
}
