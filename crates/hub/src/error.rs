// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub error taxonomy.

use car_core::RepoId;
use std::path::PathBuf;
use thiserror::Error;

/// Hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("hub lock at {path} is held by another supervisor")]
    HubLockHeld { path: PathBuf },

    #[error("unknown repo: {0}")]
    UnknownRepo(RepoId),

    #[error("repo {0} is disabled in the manifest")]
    RepoDisabled(RepoId),

    #[error("repo {0} exists in the manifest but its directory is missing")]
    RepoMissing(RepoId),

    #[error("git failed: {message}")]
    Git { message: String },

    #[error("worktree setup command `{command}` failed: {message}")]
    SetupCommand { command: String, message: String },

    #[error("worktree at {path} has uncommitted changes; pass force to clean it up")]
    WorktreeDirty { path: PathBuf },

    #[error(transparent)]
    Engine(#[from] car_engine::EngineError),

    #[error(transparent)]
    Store(#[from] car_store::StoreError),

    #[error("hub I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HubError {
    /// Exit code for scripting surfaces: 2 for configuration, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            HubError::Config(_) => 2,
            HubError::Engine(e) => e.exit_code(),
            _ => 1,
        }
    }
}
