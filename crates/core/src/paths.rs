// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State root resolution.
//!
//! Every durable artifact in the system resolves to one of three roots:
//! the repo-local state root, the hub state root, or the global state
//! root. Anything outside these must be regenerable.

use crate::destination::Destination;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-repo (and per-hub) state directory.
pub const STATE_DIR_NAME: &str = ".codex-autorunner";

/// Environment override for the global state root.
pub const GLOBAL_STATE_ROOT_ENV: &str = "CAR_GLOBAL_STATE_ROOT";

/// Path resolution errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("could not determine home directory for global state root")]
    NoHome,

    #[error("state roots collide: {0}")]
    Collision(PathBuf),
}

/// Per-repo canonical state directory: `<repo_root>/.codex-autorunner`.
pub fn repo_state_root(repo_root: &Path) -> PathBuf {
    repo_root.join(STATE_DIR_NAME)
}

/// Global state root: config override, then `$CAR_GLOBAL_STATE_ROOT`,
/// then `$HOME/.codex-autorunner`.
///
/// An override that points at a repo state root is rejected; the two
/// roots have different lifecycles and must not share a directory.
pub fn global_state_root(config_override: Option<&Path>) -> Result<PathBuf, PathError> {
    let root = match config_override {
        Some(p) => p.to_path_buf(),
        None => match std::env::var(GLOBAL_STATE_ROOT_ENV) {
            Ok(v) if !v.is_empty() => PathBuf::from(v),
            _ => dirs::home_dir().ok_or(PathError::NoHome)?.join(STATE_DIR_NAME),
        },
    };
    if root.file_name().map(|n| n == STATE_DIR_NAME).unwrap_or(false)
        && root.parent().map(|p| p.join(".git").exists()).unwrap_or(false)
    {
        return Err(PathError::Collision(root));
    }
    Ok(root)
}

/// Hub templates directory: `<hub_root>/.codex-autorunner/templates`.
pub fn hub_templates_root(hub_root: &Path) -> PathBuf {
    hub_root.join(STATE_DIR_NAME).join("templates")
}

/// Workspace root for app-server scratch state.
///
/// For docker destinations the repo bind-mount is the only writable path
/// inside the container, so the workspace root is forced under the repo
/// state root. Local destinations use the global root.
pub fn app_server_workspace_root(
    repo_root: &Path,
    destination: &Destination,
    global_root: &Path,
) -> PathBuf {
    match destination {
        Destination::Docker { .. } => repo_state_root(repo_root).join("app_server_workspaces"),
        Destination::Local => global_root.join("app_server_workspaces"),
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
