//! Display-ready projection of a snapshot.
//!
//! Pure, stateless transform consumed by whatever presentation sits on top:
//! replaces the raw start timestamp with a human-readable duration and rounds
//! the float columns to two decimals.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::snapshot::ProcessRecord;

/// Start timestamps at or below this are treated as unknown. Kernel threads
/// and permission-degraded records report bogus epoch-adjacent values.
const MIN_PLAUSIBLE_START: u64 = 1000;

/// One row of the process table as shown to the consumer.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRow {
    pub pid: u32,
    pub name: String,
    pub state: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub duration: String,
}

/// Render elapsed seconds as "1h 2m 3s", omitting zero higher units.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "0s".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || hours > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", secs));
    parts.join(" ")
}

/// Project raw records into display rows against the current wall clock.
pub fn to_display_rows(records: &[ProcessRecord]) -> Vec<DisplayRow> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    records.iter().map(|r| to_display_row(r, now)).collect()
}

fn to_display_row(record: &ProcessRecord, now: u64) -> DisplayRow {
    let duration = if record.start_time > MIN_PLAUSIBLE_START {
        format_duration(now as i64 - record.start_time as i64)
    } else {
        "N/A".to_string()
    };
    DisplayRow {
        pid: record.pid,
        name: record.name.clone(),
        state: record.state.clone(),
        cpu_percent: round2(record.cpu_percent),
        memory_mb: round2(record.memory_mb),
        duration,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start_time: u64) -> ProcessRecord {
        ProcessRecord {
            pid: 1,
            name: "p".into(),
            state: "running".into(),
            cpu_percent: 1.2345,
            memory_mb: 10.986,
            start_time,
        }
    }

    #[test]
    fn durations_use_largest_applicable_units() {
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
        assert_eq!(format_duration(61), "1m 1s");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn row_duration_is_relative_to_now() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let row = to_display_row(&record(now - 3661), now);
        assert_eq!(row.duration, "1h 1m 1s");
        let row = to_display_row(&record(now - 45), now);
        assert_eq!(row.duration, "45s");
    }

    #[test]
    fn implausible_start_times_render_as_na() {
        let now = 2_000_000_000u64;
        assert_eq!(to_display_row(&record(500), now).duration, "N/A");
        assert_eq!(to_display_row(&record(1000), now).duration, "N/A");
        assert_eq!(to_display_row(&record(0), now).duration, "N/A");
    }

    #[test]
    fn float_columns_are_rounded_to_two_decimals() {
        let row = to_display_row(&record(0), 0);
        assert_eq!(row.cpu_percent, 1.23);
        assert_eq!(row.memory_mb, 10.99);
    }
}
