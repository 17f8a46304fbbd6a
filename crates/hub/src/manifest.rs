// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub manifest: the durable list of managed repos.
//!
//! Append-only in spirit. Entries whose directory vanished are surfaced
//! as `missing` in status, never deleted here; removal is an explicit
//! user action.

use crate::error::HubError;
use car_core::{write_atomic, RepoEntry, RepoId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Manifest file path under a hub root.
pub fn manifest_path(hub_root: &Path) -> PathBuf {
    hub_root.join(car_core::STATE_DIR_NAME).join("manifest.yml")
}

/// The manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: MANIFEST_VERSION, repos: Vec::new() }
    }
}

impl Manifest {
    /// Load from a hub root; absent file yields an empty manifest.
    pub fn load(hub_root: &Path) -> Result<Self, HubError> {
        let path = manifest_path(hub_root);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(HubError::Io { path, source: e }),
        };
        serde_yaml::from_str(&content).map_err(|e| {
            HubError::Config(crate::config::ConfigError::Parse { path, message: e.to_string() })
        })
    }

    /// Persist atomically under the hub root.
    pub fn save(&self, hub_root: &Path) -> Result<(), HubError> {
        let path = manifest_path(hub_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HubError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| {
            HubError::Config(crate::config::ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })
        })?;
        write_atomic(&path, yaml.as_bytes()).map_err(|e| HubError::Io { path, source: e })
    }

    pub fn entry(&self, id: &RepoId) -> Option<&RepoEntry> {
        self.repos.iter().find(|r| &r.id == id)
    }

    pub fn entry_mut(&mut self, id: &RepoId) -> Option<&mut RepoEntry> {
        self.repos.iter_mut().find(|r| &r.id == id)
    }

    /// Insert or replace an entry, keyed by id.
    pub fn upsert(&mut self, entry: RepoEntry) {
        match self.entry_mut(&entry.id) {
            Some(slot) => *slot = entry,
            None => self.repos.push(entry),
        }
    }

    /// Remove an entry (explicit user action only).
    pub fn remove(&mut self, id: &RepoId) -> Option<RepoEntry> {
        let index = self.repos.iter().position(|r| &r.id == id)?;
        Some(self.repos.remove(index))
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
