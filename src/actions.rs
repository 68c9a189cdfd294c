//! One-shot process actions: termination and detail lookup.
//!
//! Both are thin wrappers over single OS calls; their value is the error
//! translation. Failures come back as values with human-readable messages,
//! never as panics, and a denied field inside the detail lookup degrades to a
//! sentinel instead of failing the whole call.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, Uid, User};
use tracing::{debug, info};

use crate::error::ProcError;
use crate::procfs::ProcReader;
use crate::snapshot::ProcessDetails;

/// Request OS termination of a process (SIGTERM).
///
/// Succeeds as soon as the signal is accepted; does not wait for the process
/// to actually exit.
pub fn terminate_process(pid: u32) -> Result<String, ProcError> {
    // kill(0) signals the caller's own process group, and anything past
    // i32::MAX wraps negative, addressing an arbitrary group. Neither value
    // can name a single real process, so both are "no such process".
    let target = match i32::try_from(pid) {
        Ok(t) if t > 0 => t,
        _ => return Err(ProcError::NotFound(pid)),
    };
    signal::kill(Pid::from_raw(target), Signal::SIGTERM)
        .map(|_| {
            info!("sent SIGTERM to pid {}", pid);
            format!("Process {} terminated successfully.", pid)
        })
        .map_err(|errno| match errno {
            Errno::ESRCH => ProcError::NotFound(pid),
            Errno::EPERM => ProcError::AccessDenied(pid),
            other => ProcError::Unexpected(format!("kill({}): {}", pid, other)),
        })
}

/// Best-effort per-field detail lookup.
///
/// Each field is fetched individually so that one access-denied read leaves
/// the others intact; the call as a whole fails only when the process cannot
/// be addressed at all.
pub fn get_process_details(reader: &ProcReader, pid: u32) -> Result<ProcessDetails, ProcError> {
    if !reader.pid_dir(pid).exists() {
        return Err(ProcError::NotFound(pid));
    }

    let start_time = reader
        .read_stat(pid)
        .ok()
        .map(|s| reader.start_time_epoch(s.start_ticks));

    let user = match reader.read_uid(pid) {
        Ok(Some(uid)) => resolve_user(uid),
        Ok(None) | Err(_) => None,
    };

    let threads = reader.read_thread_count(pid).ok().flatten();

    debug!(
        "details for pid {}: start_time={:?} user={:?} threads={:?}",
        pid, start_time, user, threads
    );
    Ok(ProcessDetails {
        start_time,
        user,
        threads,
    })
}

/// Map a uid to a user name via the system user database; falls back to the
/// numeric uid when no entry exists.
fn resolve_user(uid: u32) -> Option<String> {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => Some(uid.to_string()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_proc() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("stat"), "btime 1700000000\n").unwrap();
        dir
    }

    #[test]
    fn details_fail_only_for_missing_process() {
        let dir = fake_proc();
        let reader = ProcReader::new(dir.path());
        assert!(matches!(
            get_process_details(&reader, 424242),
            Err(ProcError::NotFound(424242))
        ));
    }

    #[test]
    fn denied_fields_degrade_to_none() {
        let dir = fake_proc();
        // Process directory exists but none of the accounting files are
        // readable: every field comes back as a sentinel, not an error.
        fs::create_dir_all(dir.path().join("99")).unwrap();
        let reader = ProcReader::new(dir.path());

        let details = get_process_details(&reader, 99).unwrap();
        assert!(details.start_time.is_none());
        assert!(details.user.is_none());
        assert!(details.threads.is_none());
    }

    #[test]
    fn details_resolve_available_fields() {
        let dir = fake_proc();
        let pid_dir = dir.path().join("100");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(
            pid_dir.join("stat"),
            "100 (svc) S 1 100 100 0 -1 4194304 0 0 0 0 10 5 0 0 20 0 3 0 200 0 64 18446744073709551615 0 0 0 0 0 0 0",
        )
        .unwrap();
        fs::write(pid_dir.join("status"), "Name:\tsvc\nUid:\t0\t0\t0\t0\nThreads:\t3\n").unwrap();
        let reader = ProcReader::new(dir.path());

        let details = get_process_details(&reader, 100).unwrap();
        assert!(details.start_time.unwrap() >= 1700000000);
        assert_eq!(details.threads, Some(3));
        // uid 0 resolves through the real user database on any Linux host
        assert!(details.user.is_some());
    }

    #[test]
    fn terminate_translates_missing_process() {
        // PID numbers near the 32-bit max are never allocatable.
        let err = terminate_process(0x3FFF_FFDD).unwrap_err();
        assert!(matches!(err, ProcError::NotFound(_)));
    }

    #[test]
    fn terminate_rejects_pid_zero_without_signaling() {
        // kill(0) would SIGTERM this test's own process group; surviving to
        // the assertion proves no signal was delivered.
        assert!(matches!(
            terminate_process(0),
            Err(ProcError::NotFound(0))
        ));
    }

    #[test]
    fn terminate_rejects_pids_past_the_signed_range() {
        // Values above i32::MAX would wrap negative and address a group.
        assert!(matches!(
            terminate_process(u32::MAX),
            Err(ProcError::NotFound(_))
        ));
        assert!(matches!(
            terminate_process(i32::MAX as u32 + 1),
            Err(ProcError::NotFound(_))
        ));
    }
}
