//! Single-instance guard and pid-file bookkeeping.
//!
//! A process-list scan for an "already running" daemon false-positives on
//! homonym processes; an exclusive, non-blocking `flock(2)` on the
//! configured pid-file doesn't. The lock is held open for the life of the
//! process and releases automatically on exit.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};

use crate::error::SupervisorError;

/// Holds the locked pid-file open for as long as the supervisor runs;
/// the lock releases automatically when this (and the process) drops.
pub struct PidFileGuard {
    _file: File,
    path: PathBuf,
}

impl PidFileGuard {
    /// Acquire the lock and stamp the file with our own pid. Fails with
    /// `AlreadyRunning` if another process already holds it.
    pub fn acquire(path: &Path) -> Result<Self, SupervisorError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| SupervisorError::PidFileOpen {
                path: path.to_path_buf(),
                source,
            })?;

        if let Err(_errno) = flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            let existing = std::fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            return Err(SupervisorError::AlreadyRunning { pid: existing });
        }

        file.set_len(0).ok();
        let _ = write!(file, "{}", std::process::id());
        file.flush().ok();

        Ok(PidFileGuard {
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
