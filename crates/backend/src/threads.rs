// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable workspace → thread continuity map.
//!
//! Backends resume a conversation when handed the last `thread_id` for a
//! workspace key. The map is tiny and rewritten whole on every update;
//! losing it costs only conversation continuity, never correctness.

use crate::backend::WorkspaceKey;
use car_core::write_atomic;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persistent map from workspace key to last known thread id.
pub struct ThreadMap {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl ThreadMap {
    /// Load `threads.json` from a state root, tolerating absence.
    pub fn load(state_root: &Path) -> Self {
        let path = state_root.join("threads.json");
        let map = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self { path, map: Mutex::new(map) }
    }

    /// Last known thread for a workspace key.
    pub fn get(&self, key: &WorkspaceKey) -> Option<String> {
        self.map.lock().get(key.as_str()).cloned()
    }

    /// Record the thread for a workspace key and persist.
    pub fn set(&self, key: &WorkspaceKey, thread_id: &str) {
        let snapshot = {
            let mut map = self.map.lock();
            if map.get(key.as_str()).map(|t| t.as_str()) == Some(thread_id) {
                return;
            }
            map.insert(key.as_str().to_string(), thread_id.to_string());
            map.clone()
        };
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&self.path, &bytes) {
                    tracing::warn!(path = %self.path.display(), error = %e, "thread map write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "thread map serialize failed"),
        }
    }

    /// Drop the stored thread for a key (fresh conversation next turn).
    pub fn clear(&self, key: &WorkspaceKey) {
        let snapshot = {
            let mut map = self.map.lock();
            if map.remove(key.as_str()).is_none() {
                return;
            }
            map.clone()
        };
        if let Ok(bytes) = serde_json::to_vec_pretty(&snapshot) {
            let _ = write_atomic(&self.path, &bytes);
        }
    }
}

#[cfg(test)]
#[path = "threads_tests.rs"]
mod tests;
