// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repo discovery: immediate children of the hub root carrying `.git`.

use car_core::RepoId;
use std::path::{Path, PathBuf};

/// One repo candidate found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovered {
    /// Directory basename; becomes the stable repo id when tracked.
    pub id: RepoId,
    /// Path relative to the hub root.
    pub path: PathBuf,
}

/// Enumerate repo candidates at depth 1 under `repos_root`.
///
/// A candidate is any directory containing `.git`, file or directory,
/// so linked worktrees count. Order is name-sorted for stable output.
pub fn discover_repos(repos_root: &Path) -> std::io::Result<Vec<Discovered>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(repos_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if !path.join(".git").exists() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        found.push(Discovered { id: RepoId::new(name), path: PathBuf::from(name) });
    }
    found.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(found)
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
