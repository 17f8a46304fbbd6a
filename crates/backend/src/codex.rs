// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex backend adapter.
//!
//! Runs one `codex app-server` supervisor per workspace, speaking JSONL
//! over stdio. All codex-specific wire parsing lives here; the engine
//! only ever sees normalized [`RunEvent`]s.

use crate::backend::{
    Backend, BackendError, Handle, HandleId, Health, TurnOptions, Workspace, WorkspaceKey,
};
use crate::registry::ProcessRegistry;
use crate::run_event::{notification_kind, HandoffMode, RunEvent};
use crate::server::JsonlServer;
use crate::stream::{run_event_channel, RunEventSender, RunEventStream};
use async_trait::async_trait;
use car_core::{Clock, SystemClock};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Environment override for the codex binary.
pub const CODEX_BIN_ENV: &str = "CODEX_BIN";

/// Process record kind for codex supervisors.
pub const PROCESS_KIND: &str = "codex_app_server";

/// Codex wire events, one JSON object per stdout line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CodexWire {
    ThreadStarted {
        thread_id: String,
        turn_id: String,
    },
    AgentMessageDelta {
        text: String,
    },
    TokenCount {
        total_tokens: u64,
        #[serde(default)]
        model_context_window: Option<u64>,
    },
    ToolCall {
        name: String,
        status: String,
        #[serde(default)]
        summary: Option<String>,
    },
    RateLimited {
        #[serde(default)]
        cooldown_seconds: Option<u64>,
    },
    Handoff {
        mode: HandoffMode,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        attachments: Vec<PathBuf>,
    },
    TurnCompleted {
        #[serde(default)]
        summary: String,
        #[serde(default)]
        tickets_touched: Vec<String>,
    },
    TurnFailed {
        kind: String,
        message: String,
        #[serde(default)]
        recoverable: bool,
    },
}

/// Map one stdout line onto the normalized contract.
///
/// Lines that don't parse as known wire events pass through opaquely;
/// dropping them would hide backend chatter that humans may need.
fn normalize_line(backend_id: &str, line: &str) -> RunEvent {
    let raw: serde_json::Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(_) => {
            return RunEvent::Notification {
                kind: "codex_raw".into(),
                payload: serde_json::Value::String(line.to_string()),
            }
        }
    };
    match serde_json::from_value::<CodexWire>(raw.clone()) {
        Ok(CodexWire::ThreadStarted { thread_id, turn_id }) => RunEvent::Started {
            backend_id: backend_id.to_string(),
            thread_id,
            turn_id,
        },
        Ok(CodexWire::AgentMessageDelta { text }) => RunEvent::Delta { text },
        Ok(CodexWire::TokenCount { total_tokens, model_context_window }) => {
            RunEvent::TokenUsage { total_tokens, model_context_window }
        }
        Ok(CodexWire::ToolCall { name, status, summary }) => {
            RunEvent::ToolCall { name, status, summary }
        }
        Ok(CodexWire::RateLimited { cooldown_seconds }) => RunEvent::Notification {
            kind: notification_kind::RATE_LIMITED.into(),
            payload: serde_json::json!({ "cooldown_seconds": cooldown_seconds }),
        },
        Ok(CodexWire::Handoff { mode, title, body, attachments }) => {
            RunEvent::HandoffRequested { mode, title, body, attachments }
        }
        Ok(CodexWire::TurnCompleted { summary, tickets_touched }) => {
            RunEvent::Completed { summary, tickets_touched }
        }
        Ok(CodexWire::TurnFailed { kind, message, recoverable }) => {
            RunEvent::Failed { kind, message, recoverable }
        }
        Err(_) => RunEvent::Notification { kind: "codex_raw".into(), payload: raw },
    }
}

/// Codex adapter: one supervisor per workspace key.
///
/// Records land under each workspace's own state root; the repo carries
/// its process trail with it.
pub struct CodexBackend {
    bin: String,
    servers: Mutex<HashMap<WorkspaceKey, ServerSlot>>,
    clock: SystemClock,
}

struct ServerSlot {
    server: Arc<Mutex<JsonlServer>>,
}

impl CodexBackend {
    /// Resolve the binary from `$CODEX_BIN`, falling back to PATH.
    pub fn new() -> Self {
        let bin = std::env::var(CODEX_BIN_ENV).unwrap_or_else(|_| "codex".to_string());
        Self::with_bin(bin)
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into(), servers: Mutex::new(HashMap::new()), clock: SystemClock }
    }

    fn argv(&self) -> Vec<String> {
        vec![self.bin.clone(), "app-server".to_string()]
    }
}

impl Default for CodexBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for CodexBackend {
    fn id(&self) -> &str {
        "codex"
    }

    async fn ensure_ready(&self, workspace: &Workspace) -> Result<Handle, BackendError> {
        let mut servers = self.servers.lock().await;
        let existing = servers.get(&workspace.key).map(|slot| slot.server.clone());
        if let Some(shared) = existing {
            let mut server = shared.lock().await;
            if server.alive() {
                let pid = server.pid();
                return Ok(Handle {
                    id: HandleId::new(),
                    backend_id: self.id().to_string(),
                    workspace_key: workspace.key.clone(),
                    workspace_root: workspace.repo_root.clone(),
                    pid: Some(pid),
                    base_url: None,
                });
            }
            // Supervisor died behind our back; reap it and respawn.
            server.kill_in_place().await;
            drop(server);
            servers.remove(&workspace.key);
        }

        let server = JsonlServer::spawn(
            PROCESS_KIND,
            workspace,
            &self.argv(),
            ProcessRegistry::new(&workspace.state_root),
            self.clock.timestamp(),
        )
        .await?;
        let pid = server.pid();
        tracing::info!(workspace = %workspace.key, pid, "codex app-server started");
        servers
            .insert(workspace.key.clone(), ServerSlot { server: Arc::new(Mutex::new(server)) });
        Ok(Handle {
            id: HandleId::new(),
            backend_id: self.id().to_string(),
            workspace_key: workspace.key.clone(),
            workspace_root: workspace.repo_root.clone(),
            pid: Some(pid),
            base_url: None,
        })
    }

    async fn run_turn(
        &self,
        handle: &Handle,
        prompt: &str,
        options: TurnOptions,
    ) -> Result<RunEventStream, BackendError> {
        let server = {
            let servers = self.servers.lock().await;
            let slot = servers.get(&handle.workspace_key).ok_or_else(|| BackendError::NotReady {
                backend_id: self.id().to_string(),
                message: format!("no supervisor for {}", handle.workspace_key),
            })?;
            slot.server.clone()
        };

        let request = serde_json::json!({
            "op": "run_turn",
            "thread_id": options.thread_id,
            "cwd": handle.workspace_root,
            "prompt": prompt,
        });

        let (sender, stream) = run_event_channel();
        let backend_id = self.id().to_string();
        tokio::spawn(async move {
            drive_turn(server, request, sender, backend_id).await;
        });
        Ok(stream)
    }

    async fn close(&self, handle: Handle) -> Result<(), BackendError> {
        let slot = self.servers.lock().await.remove(&handle.workspace_key);
        if let Some(slot) = slot {
            slot.server.lock().await.kill_in_place().await;
        }
        Ok(())
    }

    async fn health(&self, handle: &Handle) -> Health {
        let servers = self.servers.lock().await;
        match servers.get(&handle.workspace_key) {
            Some(slot) => {
                let alive = slot.server.lock().await.alive();
                Health { alive, detail: None }
            }
            None => Health { alive: false, detail: Some("no supervisor".into()) },
        }
    }
}

/// Drive one turn over the shared supervisor stdio.
///
/// Holds the server lock for the whole turn, so turns on one supervisor
/// are serialized by construction. Cancellation terminates the
/// supervisor process; the next `ensure_ready` restarts it.
async fn drive_turn(
    server: Arc<Mutex<JsonlServer>>,
    request: serde_json::Value,
    sender: RunEventSender,
    backend_id: String,
) {
    let cancel = sender.cancellation();
    let mut guard = server.lock().await;
    if let Err(e) = guard.request(&request).await {
        tracing::warn!(error = %e, "turn request write failed");
        return;
    }
    loop {
        // The uncompleted branch future releases its borrow when the
        // select expression ends, so `guard` is free again below.
        let line = tokio::select! {
            _ = cancel.cancelled() => None,
            line = guard.next_line() => Some(line),
        };
        let Some(line) = line else {
            tracing::info!(pid = guard.pid(), "turn cancelled; terminating supervisor");
            guard.kill_in_place().await;
            return;
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let event = normalize_line(&backend_id, &line);
                let terminal = event.is_terminal();
                if sender.send(event).await.is_err() {
                    // Consumer gone mid-turn: same as cancellation.
                    guard.kill_in_place().await;
                    return;
                }
                if terminal {
                    return;
                }
            }
            // EOF or read error: the stream ends without a terminal
            // event and the engine classifies the turn as crashed.
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "turn stream read failed");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
