// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opencode backend adapter.
//!
//! Like the codex adapter, but the supervisor can be shared: with
//! `server_scope = "global"` a single `opencode serve` process handles
//! every workspace, routed by the repo root carried on each request.

use crate::backend::{
    Backend, BackendError, Handle, HandleId, Health, TurnOptions, Workspace, WorkspaceKey,
};
use crate::registry::ProcessRegistry;
use crate::run_event::{notification_kind, HandoffMode, RunEvent};
use crate::server::JsonlServer;
use crate::stream::{run_event_channel, RunEventStream};
use async_trait::async_trait;
use car_core::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Environment override for the opencode binary.
pub const OPENCODE_BIN_ENV: &str = "OPENCODE_BIN";

/// Process record kind for opencode supervisors.
pub const PROCESS_KIND: &str = "opencode_server";

/// Whether opencode runs one supervisor per workspace or one shared one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerScope {
    #[default]
    Workspace,
    Global,
}

car_core::simple_display! {
    ServerScope {
        Workspace => "workspace",
        Global => "global",
    }
}

/// Opencode wire events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum OpencodeWire {
    SessionStarted {
        session_id: String,
        message_id: String,
    },
    Text {
        text: String,
    },
    Tokens {
        used: u64,
        #[serde(default)]
        context_window: Option<u64>,
    },
    Tool {
        name: String,
        status: String,
        #[serde(default)]
        detail: Option<String>,
    },
    Throttled {
        #[serde(default)]
        retry_after_seconds: Option<u64>,
    },
    Escalation {
        mode: HandoffMode,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        attachments: Vec<PathBuf>,
    },
    Done {
        #[serde(default)]
        summary: String,
        #[serde(default)]
        tickets_touched: Vec<String>,
    },
    Error {
        kind: String,
        message: String,
        #[serde(default)]
        recoverable: bool,
    },
}

fn normalize_line(backend_id: &str, line: &str) -> RunEvent {
    let raw: serde_json::Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(_) => {
            return RunEvent::Notification {
                kind: "opencode_raw".into(),
                payload: serde_json::Value::String(line.to_string()),
            }
        }
    };
    match serde_json::from_value::<OpencodeWire>(raw.clone()) {
        Ok(OpencodeWire::SessionStarted { session_id, message_id }) => RunEvent::Started {
            backend_id: backend_id.to_string(),
            thread_id: session_id,
            turn_id: message_id,
        },
        Ok(OpencodeWire::Text { text }) => RunEvent::Delta { text },
        Ok(OpencodeWire::Tokens { used, context_window }) => {
            RunEvent::TokenUsage { total_tokens: used, model_context_window: context_window }
        }
        Ok(OpencodeWire::Tool { name, status, detail }) => {
            RunEvent::ToolCall { name, status, summary: detail }
        }
        Ok(OpencodeWire::Throttled { retry_after_seconds }) => RunEvent::Notification {
            kind: notification_kind::RATE_LIMITED.into(),
            payload: serde_json::json!({ "cooldown_seconds": retry_after_seconds }),
        },
        Ok(OpencodeWire::Escalation { mode, title, body, attachments }) => {
            RunEvent::HandoffRequested { mode, title, body, attachments }
        }
        Ok(OpencodeWire::Done { summary, tickets_touched }) => {
            RunEvent::Completed { summary, tickets_touched }
        }
        Ok(OpencodeWire::Error { kind, message, recoverable }) => {
            RunEvent::Failed { kind, message, recoverable }
        }
        Err(_) => RunEvent::Notification { kind: "opencode_raw".into(), payload: raw },
    }
}

/// Opencode adapter.
///
/// Per-workspace supervisors record under the workspace's state root; a
/// global-scope supervisor records under the shared registry it was
/// built with.
pub struct OpencodeBackend {
    bin: String,
    scope: ServerScope,
    global_registry: ProcessRegistry,
    servers: Mutex<HashMap<WorkspaceKey, Arc<Mutex<JsonlServer>>>>,
    clock: SystemClock,
}

impl OpencodeBackend {
    pub fn new(global_registry: ProcessRegistry, scope: ServerScope) -> Self {
        let bin = std::env::var(OPENCODE_BIN_ENV).unwrap_or_else(|_| "opencode".to_string());
        Self::with_bin(global_registry, scope, bin)
    }

    pub fn with_bin(
        global_registry: ProcessRegistry,
        scope: ServerScope,
        bin: impl Into<String>,
    ) -> Self {
        Self {
            bin: bin.into(),
            scope,
            global_registry,
            servers: Mutex::new(HashMap::new()),
            clock: SystemClock,
        }
    }

    fn registry_for(&self, workspace: &Workspace) -> ProcessRegistry {
        match self.scope {
            ServerScope::Workspace => ProcessRegistry::new(&workspace.state_root),
            ServerScope::Global => self.global_registry.clone(),
        }
    }

    /// The supervisor key a workspace maps to under the configured scope.
    fn server_key(&self, workspace_key: &WorkspaceKey) -> WorkspaceKey {
        match self.scope {
            ServerScope::Workspace => workspace_key.clone(),
            ServerScope::Global => WorkspaceKey::global("opencode"),
        }
    }

    fn argv(&self) -> Vec<String> {
        vec![self.bin.clone(), "serve".to_string(), "--stdio".to_string()]
    }
}

#[async_trait]
impl Backend for OpencodeBackend {
    fn id(&self) -> &str {
        "opencode"
    }

    async fn ensure_ready(&self, workspace: &Workspace) -> Result<Handle, BackendError> {
        let key = self.server_key(&workspace.key);
        let mut servers = self.servers.lock().await;
        let existing = servers.get(&key).cloned();
        if let Some(shared) = existing {
            let mut server = shared.lock().await;
            if server.alive() {
                let pid = server.pid();
                return Ok(Handle {
                    id: HandleId::new(),
                    backend_id: self.id().to_string(),
                    workspace_key: key,
                    workspace_root: workspace.repo_root.clone(),
                    pid: Some(pid),
                    base_url: None,
                });
            }
            server.kill_in_place().await;
            drop(server);
            servers.remove(&key);
        }

        // A shared supervisor still records under the scoped key, so a
        // single record covers every workspace it serves.
        let mut scoped = workspace.clone();
        scoped.key = key.clone();
        let server = JsonlServer::spawn(
            PROCESS_KIND,
            &scoped,
            &self.argv(),
            self.registry_for(workspace),
            self.clock.timestamp(),
        )
        .await?;
        let pid = server.pid();
        tracing::info!(scope = %self.scope, server_key = %key, pid, "opencode server started");
        servers.insert(key.clone(), Arc::new(Mutex::new(server)));
        Ok(Handle {
            id: HandleId::new(),
            backend_id: self.id().to_string(),
            workspace_key: key,
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
            servers.get(&handle.workspace_key).cloned().ok_or_else(|| BackendError::NotReady {
                backend_id: self.id().to_string(),
                message: format!("no supervisor for {}", handle.workspace_key),
            })?
        };

        let request = serde_json::json!({
            "op": "message",
            "session_id": options.thread_id,
            "workspace": handle.workspace_root,
            "prompt": prompt,
        });

        let (sender, stream) = run_event_channel();
        let backend_id = self.id().to_string();
        tokio::spawn(async move {
            let cancel = sender.cancellation();
            let mut guard = server.lock().await;
            if let Err(e) = guard.request(&request).await {
                tracing::warn!(error = %e, "turn request write failed");
                return;
            }
            loop {
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
                            guard.kill_in_place().await;
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        tracing::warn!(error = %e, "turn stream read failed");
                        return;
                    }
                }
            }
        });
        Ok(stream)
    }

    async fn close(&self, handle: Handle) -> Result<(), BackendError> {
        let server = self.servers.lock().await.remove(&handle.workspace_key);
        if let Some(server) = server {
            server.lock().await.kill_in_place().await;
        }
        Ok(())
    }

    async fn health(&self, handle: &Handle) -> Health {
        let servers = self.servers.lock().await;
        match servers.get(&handle.workspace_key) {
            Some(server) => Health { alive: server.lock().await.alive(), detail: None },
            None => Health { alive: false, detail: Some("no supervisor".into()) },
        }
    }
}

#[cfg(test)]
#[path = "opencode_tests.rs"]
mod tests;
