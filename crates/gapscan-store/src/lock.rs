//! Single-instance guard backed by a PID file.
//!
//! Acquisition probes any recorded PID for liveness; a lock left behind by a
//! crashed process is reclaimed, a lock held by a live process is a conflict.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::LockError;

/// Held while this process is the sole running scanner instance. The lock
/// file is removed on [`release`](Self::release) and on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Acquire the lock, reclaiming it if the recorded owner is dead.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();

        if let Some(pid) = read_pid(&path) {
            if pid_is_alive(pid) {
                return Err(LockError::AlreadyRunning { pid });
            }
            warn!(path = %path.display(), pid, "reclaiming stale lock from dead process");
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(LockError::Io {
                        path: path.clone(),
                        source: e,
                    });
                }
            }
        }

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| LockError::Io {
                path: path.clone(),
                source: e,
            })?;
        }

        let pid = std::process::id();
        fs::write(&path, pid.to_string()).map_err(|e| LockError::Io {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), pid, "instance lock acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a lock file at `path` records a dead (or unidentifiable)
    /// owner. A missing file is not stale, it is simply absent.
    pub fn is_stale(path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        match read_pid(path) {
            Some(pid) => !pid_is_alive(pid),
            None => true,
        }
    }

    /// Remove the lock file. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let body = fs::read_to_string(path).ok()?;
    let pid = body.trim().parse::<u32>();
    match pid {
        Ok(pid) => Some(pid),
        Err(_) => {
            // Unparsable lock content means we cannot identify an owner;
            // treat it as stale.
            warn!(path = %path.display(), "lock file content unparsable, treating as stale");
            None
        }
    }
}

/// Signal-0 liveness probe on unix.
#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // kill(pid, 0) succeeds (or fails with EPERM) iff the process exists.
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Without a liveness probe, assume the recorded owner is alive; a stale
/// lock then requires manual removal, which beats running two instances.
#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}
