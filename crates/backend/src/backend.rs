// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The protocol-agnostic backend interface.

use crate::run_event::RunEvent;
use crate::stream::RunEventStream;
use async_trait::async_trait;
use car_core::{Destination, DestinationError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

car_core::define_id! {
    /// Identity of one `ensure_ready` attachment.
    pub struct HandleId("hdl-");
}

/// Key scoping backend sessions and managed processes.
///
/// Examples: `ticket_flow.api`, `file_chat.workspace./work/api`,
/// `opencode.global`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WorkspaceKey(String);

impl WorkspaceKey {
    /// Key for a repo's ticket flow.
    pub fn ticket_flow(repo_id: &str) -> Self {
        Self(format!("ticket_flow.{repo_id}"))
    }

    /// Key for ad-hoc chat over a workspace directory.
    pub fn file_chat(workspace: &std::path::Path) -> Self {
        Self(format!("file_chat.workspace.{}", workspace.display()))
    }

    /// Key for a single shared (global-scope) supervisor.
    pub fn global(backend_id: &str) -> Self {
        Self(format!("{backend_id}.global"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form used for process record file names.
    pub fn file_safe(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl std::fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a backend needs to know about where it runs.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub key: WorkspaceKey,
    /// Repo root, bind-mounted into docker destinations.
    pub repo_root: PathBuf,
    /// Repo state root holding process records and scratch space.
    pub state_root: PathBuf,
    pub destination: Destination,
}

/// Options for a single turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Conversation to resume; `None` starts a fresh thread.
    pub thread_id: Option<String>,
    /// Wall-clock budget for the turn, enforced by the engine.
    pub turn_timeout: Option<Duration>,
}

/// An attachment to a ready backend supervisor.
#[derive(Debug, Clone)]
pub struct Handle {
    pub id: HandleId,
    pub backend_id: String,
    pub workspace_key: WorkspaceKey,
    /// Repo root the turn operates on. Carried on the handle because a
    /// shared (global-scope) supervisor serves many roots.
    pub workspace_root: PathBuf,
    /// PID of the supervisor process, when one exists.
    pub pid: Option<i32>,
    pub base_url: Option<String>,
}

/// Liveness report for a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub alive: bool,
    pub detail: Option<String>,
}

/// Backend adapter errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error("backend {backend_id} is not ready: {message}")]
    NotReady { backend_id: String, message: String },

    #[error("backend protocol error: {message}")]
    Protocol { message: String },

    #[error("backend I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error(transparent)]
    ProcessRecord(#[from] car_core::ProcessRecordError),
}

impl BackendError {
    /// Whether retrying the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Spawn { .. } | BackendError::Io { .. } | BackendError::NotReady { .. })
    }
}

/// What every backend must implement.
///
/// `ensure_ready` is idempotent per workspace key: attaching twice yields
/// the same underlying supervisor. Only a backend (or the registry it
/// uses) may spawn subprocesses; the engine never does.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend id, e.g. `codex` or `opencode`.
    fn id(&self) -> &str;

    /// Start or attach to the underlying supervisor for this workspace.
    async fn ensure_ready(&self, workspace: &Workspace) -> Result<Handle, BackendError>;

    /// Execute a single turn. The returned stream is finite and
    /// non-restartable; its terminal element is `Completed` or `Failed`.
    async fn run_turn(
        &self,
        handle: &Handle,
        prompt: &str,
        options: TurnOptions,
    ) -> Result<RunEventStream, BackendError>;

    /// Release resources. Best-effort; idempotent.
    async fn close(&self, handle: Handle) -> Result<(), BackendError>;

    /// Liveness of the supervisor behind a handle.
    async fn health(&self, handle: &Handle) -> Health;
}

/// Statically assert the trait stays object-safe; the orchestrator
/// stores adapters as `Arc<dyn Backend>`.
#[allow(dead_code)]
fn _object_safe(_: &dyn Backend) {}

/// Convenience constructor for events adapters emit on crashed turns.
pub fn turn_crash_event(message: impl Into<String>) -> RunEvent {
    RunEvent::Failed {
        kind: crate::run_event::failure_kind::TURN_CRASH.into(),
        message: message.into(),
        recoverable: true,
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
