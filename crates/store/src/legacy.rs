// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only compatibility with legacy numeric run-log directories.
//!
//! Older layouts kept per-run output under `runs/<N>/` with a numeric
//! index instead of a run id. Those directories are never written or
//! migrated; they are only listed so old history stays inspectable.

use std::path::{Path, PathBuf};

/// List legacy numeric run directories under `<state_root>/runs`,
/// ordered by index. Non-numeric directory names are ignored; those
/// belong to the current run-id layout.
pub fn list_legacy_run_dirs(state_root: &Path) -> Vec<(u64, PathBuf)> {
    let runs_dir = state_root.join("runs");
    let Ok(entries) = std::fs::read_dir(&runs_dir) else { return Vec::new() };
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Ok(index) = name.parse::<u64>() {
            dirs.push((index, entry.path()));
        }
    }
    dirs.sort();
    dirs
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
