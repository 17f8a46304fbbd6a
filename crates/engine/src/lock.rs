// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-repo exclusion lock.
//!
//! A lock file under the repo state root carries the owner PID and start
//! time. Liveness is judged against the OS process table: a lock whose
//! PID is gone is stale and may be reclaimed; a live PID refuses the
//! acquisition without touching anything.

use car_core::{pid_alive, write_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFileContents {
    pub pid: i32,
    pub started_at: String,
}

/// Observed state of a repo lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    LockedAlive { pid: i32 },
    LockedStale { pid: i32 },
}

car_core::simple_display! {
    LockStatus {
        Unlocked => "unlocked",
        LockedAlive { .. } => "locked_alive",
        LockedStale { .. } => "locked_stale",
    }
}

/// Lock file path under a repo state root.
pub fn lock_path(state_root: &Path) -> PathBuf {
    state_root.join("lock")
}

/// Inspect the lock without acquiring it.
///
/// An unreadable or malformed lock file counts as stale with pid 0:
/// it cannot belong to a live engine, and leaving it would wedge the
/// repo forever.
pub fn inspect_lock(state_root: &Path) -> LockStatus {
    let path = lock_path(state_root);
    let Ok(bytes) = std::fs::read(&path) else { return LockStatus::Unlocked };
    let contents: LockFileContents = match serde_json::from_slice(&bytes) {
        Ok(contents) => contents,
        Err(_) => return LockStatus::LockedStale { pid: 0 },
    };
    if pid_alive(contents.pid) {
        LockStatus::LockedAlive { pid: contents.pid }
    } else {
        LockStatus::LockedStale { pid: contents.pid }
    }
}

/// Outcome of a successful acquisition.
#[derive(Debug)]
pub struct Acquired {
    pub lock: RepoLock,
    /// PID of the dead owner we displaced, if the lock was stale.
    pub recovered_from: Option<i32>,
}

/// A held repo lock. Released explicitly or on drop (best effort).
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    released: bool,
}

impl RepoLock {
    /// Try to take the lock. Never blocks.
    ///
    /// Returns `Err(pid)` when a live process owns it. A stale lock is
    /// replaced and the dead owner's PID reported for the recovery event.
    pub fn acquire(state_root: &Path, started_at: &str) -> Result<Acquired, AcquireError> {
        std::fs::create_dir_all(state_root)
            .map_err(|e| AcquireError::Io { path: state_root.to_path_buf(), source: e })?;
        let path = lock_path(state_root);
        let contents = LockFileContents {
            pid: std::process::id() as i32,
            started_at: started_at.to_string(),
        };
        let bytes = serde_json::to_vec_pretty(&contents)
            .map_err(|e| AcquireError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;

        match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                use std::io::Write as _;
                file.write_all(&bytes)
                    .map_err(|e| AcquireError::Io { path: path.clone(), source: e })?;
                Ok(Acquired { lock: Self { path, released: false }, recovered_from: None })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match inspect_lock(state_root) {
                    LockStatus::LockedAlive { pid } => Err(AcquireError::Held { pid }),
                    LockStatus::LockedStale { pid } => {
                        write_atomic(&path, &bytes)
                            .map_err(|e| AcquireError::Io { path: path.clone(), source: e })?;
                        Ok(Acquired {
                            lock: Self { path, released: false },
                            recovered_from: Some(pid),
                        })
                    }
                    // Owner vanished between open and inspect; retry the
                    // create path once via atomic replace.
                    LockStatus::Unlocked => {
                        write_atomic(&path, &bytes)
                            .map_err(|e| AcquireError::Io { path: path.clone(), source: e })?;
                        Ok(Acquired { lock: Self { path, released: false }, recovered_from: None })
                    }
                }
            }
            Err(e) => Err(AcquireError::Io { path, source: e }),
        }
    }

    /// Remove the lock file.
    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Lock acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("repo lock held by live pid {pid}")]
    Held { pid: i32 },

    #[error("lock I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
