// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed process records.
//!
//! Every long-lived subprocess the system spawns gets a durable JSON
//! record so crash recovery can find it again: one file keyed by
//! workspace id and one keyed by PID, both written atomically. Readers
//! tolerate transient absence; a record mid-rename simply reads as gone.

use crate::fsutil::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Durable metadata for one managed subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedProcessRecord {
    /// Process kind, e.g. `codex_app_server` or `opencode_server`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub pid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgid: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub command: Vec<String>,
    /// PID of the supervisor that spawned this process.
    pub owner_pid: i32,
    /// RFC 3339 start timestamp.
    pub started_at: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

/// Process record I/O errors
#[derive(Debug, Error)]
pub enum ProcessRecordError {
    #[error("failed to write process record {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read process record {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed process record {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ManagedProcessRecord {
    /// Directory holding records of this kind under a processes root.
    pub fn kind_dir(processes_root: &Path, kind: &str) -> PathBuf {
        processes_root.join(kind)
    }

    /// The two key files for this record.
    pub fn paths(&self, processes_root: &Path) -> Vec<PathBuf> {
        let dir = Self::kind_dir(processes_root, &self.kind);
        let mut paths = Vec::with_capacity(2);
        if let Some(ws) = &self.workspace_id {
            paths.push(dir.join(format!("{ws}.json")));
        }
        paths.push(dir.join(format!("{}.json", self.pid)));
        paths
    }

    /// Write both key files atomically.
    pub fn write(&self, processes_root: &Path) -> Result<(), ProcessRecordError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| ProcessRecordError::Malformed {
            path: processes_root.to_path_buf(),
            source: e,
        })?;
        for path in self.paths(processes_root) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ProcessRecordError::Write { path: path.clone(), source: e })?;
            }
            write_atomic(&path, &json)
                .map_err(|e| ProcessRecordError::Write { path: path.clone(), source: e })?;
        }
        Ok(())
    }

    /// Remove both key files. Missing files are not an error.
    pub fn remove(&self, processes_root: &Path) -> Result<(), ProcessRecordError> {
        for path in self.paths(processes_root) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ProcessRecordError::Write { path, source: e }),
            }
        }
        Ok(())
    }
}

/// Load a record by workspace id. `Ok(None)` when absent.
pub fn load_by_workspace(
    processes_root: &Path,
    kind: &str,
    workspace_id: &str,
) -> Result<Option<ManagedProcessRecord>, ProcessRecordError> {
    load_record(&ManagedProcessRecord::kind_dir(processes_root, kind).join(format!("{workspace_id}.json")))
}

/// Load a record by PID. `Ok(None)` when absent.
pub fn load_by_pid(
    processes_root: &Path,
    kind: &str,
    pid: i32,
) -> Result<Option<ManagedProcessRecord>, ProcessRecordError> {
    load_record(&ManagedProcessRecord::kind_dir(processes_root, kind).join(format!("{pid}.json")))
}

fn load_record(path: &Path) -> Result<Option<ManagedProcessRecord>, ProcessRecordError> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProcessRecordError::Read { path: path.to_path_buf(), source: e }),
    };
    let record = serde_json::from_slice(&content)
        .map_err(|e| ProcessRecordError::Malformed { path: path.to_path_buf(), source: e })?;
    Ok(Some(record))
}

/// List every record of a kind, deduplicated by PID.
pub fn list_kind(
    processes_root: &Path,
    kind: &str,
) -> Result<Vec<ManagedProcessRecord>, ProcessRecordError> {
    let dir = ManagedProcessRecord::kind_dir(processes_root, kind);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ProcessRecordError::Read { path: dir, source: e }),
    };
    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProcessRecordError::Read { path: dir.clone(), source: e })?;
        let path = entry.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        // A record mid-rename or just-removed reads as absent.
        if let Some(record) = load_record(&path).ok().flatten() {
            if seen.insert(record.pid) {
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Whether a PID is present in the OS process table.
///
/// Signal 0 probes without delivering; EPERM still means the process
/// exists, just owned by someone else.
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
