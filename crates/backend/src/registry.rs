// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The managed process registry.
//!
//! Every long-lived subprocess a backend spawns is recorded here before
//! it is relied on, and its record is removed only after a successful
//! reap. That ordering is what makes crash recovery possible: a record
//! with a dead PID is an orphan to clean up, a live PID with no record
//! is a bug.

use car_core::{pid_alive, ManagedProcessRecord, ProcessRecordError};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default grace period between SIGTERM and SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Filesystem-backed registry of managed subprocess records.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    root: PathBuf,
}

impl ProcessRegistry {
    /// Registry under `<state_root>/processes`.
    pub fn new(state_root: &Path) -> Self {
        Self { root: state_root.join("processes") }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a record (both key files, atomically).
    pub fn record(&self, record: &ManagedProcessRecord) -> Result<(), ProcessRecordError> {
        record.write(&self.root)
    }

    pub fn load_by_workspace(
        &self,
        kind: &str,
        workspace_id: &str,
    ) -> Result<Option<ManagedProcessRecord>, ProcessRecordError> {
        car_core::process::load_by_workspace(&self.root, kind, workspace_id)
    }

    pub fn list_kind(&self, kind: &str) -> Result<Vec<ManagedProcessRecord>, ProcessRecordError> {
        car_core::process::list_kind(&self.root, kind)
    }

    /// Count of live processes across every kind, used by tests to
    /// prove nothing leaked.
    pub fn live_count(&self) -> usize {
        let Ok(kinds) = std::fs::read_dir(&self.root) else { return 0 };
        let mut count = 0;
        for entry in kinds.flatten() {
            let Some(kind) = entry.file_name().to_str().map(String::from) else { continue };
            if let Ok(records) = self.list_kind(&kind) {
                count += records.iter().filter(|r| pid_alive(r.pid)).count();
            }
        }
        count
    }

    /// Terminate the recorded process: SIGTERM, bounded grace, SIGKILL.
    ///
    /// The record is removed only once the PID has left the process
    /// table. An already-dead process just gets its record cleaned up.
    pub async fn terminate(
        &self,
        record: &ManagedProcessRecord,
        grace: Duration,
    ) -> Result<(), ProcessRecordError> {
        let target = Pid::from_raw(record.pgid.map(|pg| -pg).unwrap_or(record.pid));
        if pid_alive(record.pid) {
            let _ = kill(target, Signal::SIGTERM);
            let deadline = tokio::time::Instant::now() + grace;
            while pid_alive(record.pid) && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if pid_alive(record.pid) {
                tracing::warn!(pid = record.pid, kind = %record.kind, "grace expired; killing");
                let _ = kill(target, Signal::SIGKILL);
                let kill_deadline = tokio::time::Instant::now() + Duration::from_secs(2);
                while pid_alive(record.pid) && tokio::time::Instant::now() < kill_deadline {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
        if pid_alive(record.pid) {
            // Likely an unreapable zombie owned by another live process.
            // Keep the record; a later sweep retries once the PID clears.
            tracing::warn!(pid = record.pid, kind = %record.kind, "pid survived SIGKILL; keeping record");
            return Ok(());
        }
        record.remove(&self.root)
    }

    /// Remove records whose PID is no longer in the process table.
    ///
    /// Returns the swept records so callers can log what died behind
    /// their back.
    pub fn sweep_orphans(&self, kind: &str) -> Result<Vec<ManagedProcessRecord>, ProcessRecordError> {
        let mut swept = Vec::new();
        for record in self.list_kind(kind)? {
            if !pid_alive(record.pid) {
                record.remove(&self.root)?;
                swept.push(record);
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
