// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator: the engine's single entry point into backends.
//!
//! Selects an adapter by agent id, keeps workspace → handle attachments,
//! retries transient startup failures with backoff, and maintains thread
//! continuity by watching each turn's `Started` event. The turn itself
//! is never retried here; retry policy belongs to the engine.

use crate::backend::{Backend, BackendError, Handle, TurnOptions, Workspace, WorkspaceKey};
use crate::backoff::Backoff;
use crate::breaker::CircuitBreaker;
use crate::run_event::RunEvent;
use crate::stream::{run_event_channel, RunEventStream};
use crate::threads::ThreadMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no backend registered for agent {0:?}")]
    UnknownBackend(String),

    #[error("backend {agent} failed to start after {attempts} attempts: {message}")]
    StartFailure { agent: String, attempts: u32, message: String },

    #[error("backend {agent} circuit is open; retry in {retry_in_secs}s")]
    CircuitOpen { agent: String, retry_in_secs: u64 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Owns every backend adapter and their supervisor attachments.
pub struct Orchestrator {
    backends: HashMap<String, Arc<dyn Backend>>,
    handles: Mutex<HashMap<(String, WorkspaceKey), Handle>>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    threads: Arc<ThreadMap>,
    backoff: Backoff,
}

impl Orchestrator {
    /// Orchestrator with thread continuity persisted under `state_root`.
    pub fn new(state_root: &Path) -> Self {
        Self {
            backends: HashMap::new(),
            handles: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
            threads: Arc::new(ThreadMap::load(state_root)),
            backoff: Backoff::default(),
        }
    }

    fn breaker(&self, agent_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .lock()
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(agent_id)))
            .clone()
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Register an adapter under its own id.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    pub fn backend_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn backend(&self, agent_id: &str) -> Result<Arc<dyn Backend>, OrchestratorError> {
        self.backends
            .get(agent_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownBackend(agent_id.to_string()))
    }

    /// Last stored thread for a workspace key.
    pub fn stored_thread(&self, key: &WorkspaceKey) -> Option<String> {
        self.threads.get(key)
    }

    /// Forget the stored thread (next turn starts a fresh conversation).
    pub fn clear_thread(&self, key: &WorkspaceKey) {
        self.threads.clear(key);
    }

    /// Start or attach to the backend supervisor for a workspace.
    ///
    /// A cached handle is revalidated against `health` first; dead
    /// supervisors are restarted transparently. Startup failures are
    /// retried with capped exponential backoff before surfacing.
    pub async fn ensure_ready(
        &self,
        agent_id: &str,
        workspace: &Workspace,
    ) -> Result<Handle, OrchestratorError> {
        let backend = self.backend(agent_id)?;
        let cache_key = (agent_id.to_string(), workspace.key.clone());

        let cached = self.handles.lock().get(&cache_key).cloned();
        if let Some(handle) = cached {
            if backend.health(&handle).await.alive {
                return Ok(handle);
            }
            self.handles.lock().remove(&cache_key);
        }

        let breaker = self.breaker(agent_id);
        if let Err(open) = breaker.check(tokio::time::Instant::now().into_std()) {
            return Err(OrchestratorError::CircuitOpen {
                agent: agent_id.to_string(),
                retry_in_secs: open.retry_in.as_secs(),
            });
        }

        let attempts = self.backoff.attempts;
        let handle = match self
            .backoff
            .retry("ensure_ready", || backend.ensure_ready(workspace))
            .await
        {
            Ok(handle) => {
                breaker.record_success();
                handle
            }
            Err(e) => {
                breaker.record_failure(tokio::time::Instant::now().into_std());
                return Err(OrchestratorError::StartFailure {
                    agent: agent_id.to_string(),
                    attempts,
                    message: format!("{e} (breaker {})", breaker.state_name()),
                });
            }
        };
        self.handles.lock().insert(cache_key, handle.clone());
        Ok(handle)
    }

    /// Run a single turn for a workspace.
    ///
    /// Fills in the stored thread id when the caller didn't pin one, and
    /// tees the returned stream to capture the `Started` event so the
    /// next turn resumes the same conversation.
    pub async fn run_turn(
        &self,
        agent_id: &str,
        workspace: &Workspace,
        prompt: &str,
        mut options: TurnOptions,
    ) -> Result<RunEventStream, OrchestratorError> {
        let backend = self.backend(agent_id)?;
        let handle = self.ensure_ready(agent_id, workspace).await?;
        if options.thread_id.is_none() {
            options.thread_id = self.threads.get(&workspace.key);
        }

        let mut inner = backend.run_turn(&handle, prompt, options).await?;
        let (sender, outer) = run_event_channel();
        let threads = self.threads.clone();
        let continuity_key = workspace.key.clone();
        let outer_cancel = sender.cancellation();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = outer_cancel.cancelled() => {
                        inner.cancel();
                        break;
                    }
                    event = inner.next() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if let RunEvent::Started { thread_id, .. } = &event {
                    threads.set(&continuity_key, thread_id);
                }
                if sender.send(event).await.is_err() {
                    inner.cancel();
                    break;
                }
            }
        });
        Ok(outer)
    }

    /// Close a single workspace attachment.
    pub async fn close_workspace(&self, agent_id: &str, key: &WorkspaceKey) {
        let cache_key = (agent_id.to_string(), key.clone());
        let handle = self.handles.lock().remove(&cache_key);
        if let Some(handle) = handle {
            if let Ok(backend) = self.backend(agent_id) {
                if let Err(e) = backend.close(handle).await {
                    tracing::warn!(agent = agent_id, workspace = %key, error = %e, "close failed");
                }
            }
        }
    }

    /// Close every attachment. Idempotent; safe to call on shutdown paths
    /// that may race each other.
    pub async fn close(&self) {
        let handles: Vec<((String, WorkspaceKey), Handle)> =
            self.handles.lock().drain().collect();
        for ((agent_id, key), handle) in handles {
            if let Ok(backend) = self.backend(&agent_id) {
                if let Err(e) = backend.close(handle).await {
                    tracing::warn!(agent = %agent_id, workspace = %key, error = %e, "close failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
