// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent per-repo initialization.
//!
//! Init progress and failure are visible on disk: a PID-carrying
//! `initializing` marker sits in the state root while seeding is in
//! flight, and a failed init (or worktree provision) leaves an
//! `init_error` marker with the message. Status derivation reads both,
//! so an interrupted or failed init surfaces instead of looking idle.

use crate::config::{ConfigFile, Mode};
use crate::error::HubError;
use car_core::{repo_state_root, write_atomic};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Seed content for the state-root `.gitignore`: ignore everything but
/// itself, so repo state never lands in version control by accident.
const STATE_GITIGNORE: &str = "*\n!/.gitignore\n";

const ACTIVE_CONTEXT_SEED: &str = "# Active context\n\nWhat the agents are working on right now.\n";
const DECISIONS_SEED: &str = "# Decisions\n\nDurable decisions agents must respect.\n";
const SPEC_SEED: &str = "# Spec\n\nWhat this repo is building.\n";

/// Marker present while an init is in flight.
const INITIALIZING_MARKER: &str = "initializing";

/// Marker left behind by a failed init or worktree provision.
const INIT_ERROR_MARKER: &str = "init_error";

/// Contents of the in-flight marker. Carries the worker PID so an init
/// whose process died reads as a failure, not as forever-pending.
#[derive(Debug, Serialize, Deserialize)]
struct InitializingMarker {
    pid: i32,
}

/// Whether a repo has a state root at all.
pub fn is_initialized(repo_root: &Path) -> bool {
    repo_state_root(repo_root).join("config.yml").exists()
}

/// PID of an in-flight init, when one is marked.
pub fn initializing_pid(state_root: &Path) -> Option<i32> {
    let bytes = std::fs::read(state_root.join(INITIALIZING_MARKER)).ok()?;
    serde_json::from_slice::<InitializingMarker>(&bytes).ok().map(|m| m.pid)
}

/// Message from the last failed init, if any.
pub fn read_init_error(state_root: &Path) -> Option<String> {
    std::fs::read_to_string(state_root.join(INIT_ERROR_MARKER))
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Record an init failure. Best-effort; the original error stays primary.
pub(crate) fn write_init_error(state_root: &Path, message: &str) {
    if std::fs::create_dir_all(state_root).is_err() {
        return;
    }
    if let Err(e) = write_atomic(&state_root.join(INIT_ERROR_MARKER), message.as_bytes()) {
        tracing::warn!(path = %state_root.display(), error = %e, "init error marker write failed");
    }
}

fn clear_marker(state_root: &Path, name: &str) {
    let _ = std::fs::remove_file(state_root.join(name));
}

fn write_if_absent(path: &Path, content: &str) -> Result<bool, HubError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HubError::Io { path: parent.to_path_buf(), source: e })?;
    }
    std::fs::write(path, content)
        .map_err(|e| HubError::Io { path: path.to_path_buf(), source: e })?;
    Ok(true)
}

/// Initialize a repo's state root. Safe to call repeatedly; existing
/// files are never overwritten, and a successful pass clears any stale
/// failure marker from an earlier attempt.
pub fn init_repo(repo_root: &Path) -> Result<(), HubError> {
    let state_root = repo_state_root(repo_root);
    std::fs::create_dir_all(&state_root)
        .map_err(|e| HubError::Io { path: state_root.clone(), source: e })?;

    let marker = InitializingMarker { pid: std::process::id() as i32 };
    if let Ok(bytes) = serde_json::to_vec_pretty(&marker) {
        let _ = write_atomic(&state_root.join(INITIALIZING_MARKER), &bytes);
    }

    let result = seed_state_root(&state_root);
    match &result {
        Ok(()) => clear_marker(&state_root, INIT_ERROR_MARKER),
        Err(e) => write_init_error(&state_root, &e.to_string()),
    }
    clear_marker(&state_root, INITIALIZING_MARKER);
    result
}

fn seed_state_root(state_root: &Path) -> Result<(), HubError> {
    std::fs::create_dir_all(state_root.join("tickets"))
        .map_err(|e| HubError::Io { path: state_root.join("tickets"), source: e })?;

    write_if_absent(&state_root.join(".gitignore"), STATE_GITIGNORE)?;

    let config_path = state_root.join("config.yml");
    if !config_path.exists() {
        let config = ConfigFile { mode: Mode::Repo, ..ConfigFile::repo_defaults() };
        let yaml = serde_yaml::to_string(&config).map_err(|e| {
            HubError::Config(crate::config::ConfigError::Parse {
                path: config_path.clone(),
                message: e.to_string(),
            })
        })?;
        std::fs::write(&config_path, yaml)
            .map_err(|e| HubError::Io { path: config_path.clone(), source: e })?;
    }

    write_if_absent(&state_root.join("contextspace/active_context.md"), ACTIVE_CONTEXT_SEED)?;
    write_if_absent(&state_root.join("contextspace/decisions.md"), DECISIONS_SEED)?;
    write_if_absent(&state_root.join("contextspace/spec.md"), SPEC_SEED)?;

    // Empty flow store and log file so the layout is complete from day one.
    for name in ["flows.db", "codex-autorunner.log"] {
        let path = state_root.join(name);
        if !path.exists() {
            std::fs::write(&path, b"").map_err(|e| HubError::Io { path: path.clone(), source: e })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
