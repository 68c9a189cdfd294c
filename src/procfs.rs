//! Low-level readers for the /proc process table.
//!
//! `ProcReader` owns the conversion constants that depend on the running
//! kernel (clock tick rate, page size, boot time) and knows how to parse the
//! per-process accounting files. The proc root is a parameter so tests can
//! point the reader at a synthetic tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Fields extracted from one `/proc/<pid>/stat` line.
#[derive(Debug, Clone)]
pub struct ProcStat {
    /// The comm field, stripped of its parentheses. May be empty.
    pub name: String,
    pub state: char,
    /// utime + stime in clock ticks.
    pub total_ticks: u64,
    /// Process start time in clock ticks after boot.
    pub start_ticks: u64,
    pub rss_pages: u64,
}

/// Reader for a /proc-style process table rooted at an arbitrary path.
pub struct ProcReader {
    root: PathBuf,
    page_size: u64,
    clock_ticks: u64,
    boot_time: u64,
}

impl ProcReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(1) as u64;
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) }.max(1) as u64;
        let boot_time = read_boot_time(&root);
        Self {
            root,
            page_size,
            clock_ticks,
            boot_time,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clock_ticks(&self) -> u64 {
        self.clock_ticks
    }

    /// Path of the per-process accounting directory.
    pub fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Enumerate the numeric entries of the proc root, in directory order.
    pub fn list_pids(&self) -> io::Result<Vec<u32>> {
        let mut pids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Ok(pid) = name.parse::<u32>() {
                pids.push(pid);
            }
        }
        Ok(pids)
    }

    /// Parse `/proc/<pid>/stat`.
    ///
    /// The comm field is delimited by parentheses and may itself contain
    /// spaces or parentheses, so the line is split at the last `)`.
    pub fn read_stat(&self, pid: u32) -> io::Result<ProcStat> {
        let content = fs::read_to_string(self.pid_dir(pid).join("stat"))?;
        parse_stat_line(&content)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed stat line"))
    }

    /// Read the process name from `/proc/<pid>/comm`.
    pub fn read_comm(&self, pid: u32) -> io::Result<String> {
        let content = fs::read_to_string(self.pid_dir(pid).join("comm"))?;
        Ok(content.trim().to_string())
    }

    /// Derive a process name from the first argv element of
    /// `/proc/<pid>/cmdline`.
    pub fn read_cmdline_name(&self, pid: u32) -> io::Result<Option<String>> {
        let content = fs::read(self.pid_dir(pid).join("cmdline"))?;
        let first = content.split(|&b| b == 0u8).next().unwrap_or(&[]);
        let Ok(arg0) = std::str::from_utf8(first) else {
            return Ok(None);
        };
        Ok(Path::new(arg0)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string()))
    }

    /// Read a single field ("State", "Uid", "Threads", ...) from
    /// `/proc/<pid>/status`.
    pub fn read_status_field(&self, pid: u32, field: &str) -> io::Result<Option<String>> {
        let content = fs::read_to_string(self.pid_dir(pid).join("status"))?;
        let prefix = format!("{}:", field);
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(&prefix) {
                return Ok(Some(rest.trim().to_string()));
            }
        }
        Ok(None)
    }

    /// Real uid of the process, from the first column of the Uid status line.
    pub fn read_uid(&self, pid: u32) -> io::Result<Option<u32>> {
        let Some(value) = self.read_status_field(pid, "Uid")? else {
            return Ok(None);
        };
        Ok(value.split_whitespace().next().and_then(|v| v.parse().ok()))
    }

    pub fn read_thread_count(&self, pid: u32) -> io::Result<Option<u32>> {
        let Some(value) = self.read_status_field(pid, "Threads")? else {
            return Ok(None);
        };
        Ok(value.parse().ok())
    }

    /// Resident memory in megabytes.
    pub fn rss_mb(&self, rss_pages: u64) -> f64 {
        (rss_pages * self.page_size) as f64 / (1024.0 * 1024.0)
    }

    /// Process creation time as seconds since the epoch; 0 when boot time is
    /// unknown.
    pub fn start_time_epoch(&self, start_ticks: u64) -> u64 {
        if self.boot_time == 0 {
            return 0;
        }
        self.boot_time + start_ticks / self.clock_ticks
    }
}

/// Boot time in epoch seconds from the `btime` line of `<root>/stat`.
fn read_boot_time(root: &Path) -> u64 {
    let Ok(content) = fs::read_to_string(root.join("stat")) else {
        return 0;
    };
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("btime ") {
            return rest.trim().parse().unwrap_or(0);
        }
    }
    0
}

fn parse_stat_line(line: &str) -> Option<ProcStat> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let name = line.get(open + 1..close)?.to_string();
    let rest: Vec<&str> = line.get(close + 1..)?.split_whitespace().collect();
    // rest[0] is field 3 (state); stat fields are 1-based in proc(5).
    if rest.len() < 22 {
        return None;
    }
    let state = rest[0].chars().next().unwrap_or('?');
    let utime: u64 = rest[11].parse().unwrap_or(0);
    let stime: u64 = rest[12].parse().unwrap_or(0);
    let start_ticks: u64 = rest[19].parse().unwrap_or(0);
    let rss_pages: u64 = rest[21].parse().unwrap_or(0);
    Some(ProcStat {
        name,
        state,
        total_ticks: utime + stime,
        start_ticks,
        rss_pages,
    })
}

/// Map a stat state character to the label exposed in snapshots.
pub fn state_label(state: char) -> &'static str {
    match state {
        'R' => "running",
        'S' => "sleeping",
        'D' => "disk-sleep",
        'Z' => "zombie",
        'T' => "stopped",
        't' => "traced",
        'I' => "idle",
        'X' | 'x' => "dead",
        _ => crate::snapshot::UNKNOWN_STATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_proc() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("stat"), "cpu  1 2 3 4 5 6 7 8\nbtime 1700000000\n").unwrap();
        dir
    }

    fn write_pid(dir: &TempDir, pid: u32, stat: &str) {
        let pid_dir = dir.path().join(pid.to_string());
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat).unwrap();
    }

    #[test]
    fn parses_stat_with_spaced_comm() {
        let stat = parse_stat_line(
            "123 (Web Content) S 1 123 123 0 -1 4194304 100 0 0 0 250 150 0 0 20 0 4 0 9000 1000000 2048 18446744073709551615 0 0 0 0 0 0 0",
        )
        .expect("parsed");
        assert_eq!(stat.name, "Web Content");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.total_ticks, 400);
        assert_eq!(stat.start_ticks, 9000);
        assert_eq!(stat.rss_pages, 2048);
    }

    #[test]
    fn rejects_truncated_stat() {
        assert!(parse_stat_line("123 (short) S 1 2 3").is_none());
    }

    #[test]
    fn lists_only_numeric_entries() {
        let dir = fake_proc();
        write_pid(&dir, 1, "1 (init) S 0 1 1 0 -1 4194304 0 0 0 0 0 0 0 0 20 0 1 0 5 0 10 0 0 0 0 0 0 0 0 0 0");
        fs::create_dir_all(dir.path().join("sys")).unwrap();

        let reader = ProcReader::new(dir.path());
        let pids = reader.list_pids().unwrap();
        assert_eq!(pids, vec![1]);
    }

    #[test]
    fn reads_boot_time_for_epoch_start() {
        let dir = fake_proc();
        let reader = ProcReader::new(dir.path());
        let epoch = reader.start_time_epoch(reader.clock_ticks() * 60);
        assert_eq!(epoch, 1700000000 + 60);
    }

    #[test]
    fn missing_boot_time_yields_zero_start() {
        let dir = TempDir::new().unwrap();
        let reader = ProcReader::new(dir.path());
        assert_eq!(reader.start_time_epoch(12345), 0);
    }

    #[test]
    fn state_labels_cover_common_states() {
        assert_eq!(state_label('R'), "running");
        assert_eq!(state_label('Z'), "zombie");
        assert_eq!(state_label('?'), "unknown");
    }
}
