// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted backend for engine and hub tests.
//!
//! Each pushed turn is a fixed event sequence; a turn whose events lack
//! a terminal element simulates a crashed stream, and `hold_open` turns
//! park after their events until cancelled, for exercising stop paths.

use crate::backend::{Backend, BackendError, Handle, HandleId, Health, TurnOptions, Workspace};
use crate::run_event::RunEvent;
use crate::stream::{run_event_channel, RunEventStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type TurnHook = Box<dyn Fn() + Send + Sync>;

/// One scripted turn.
pub struct ScriptedTurn {
    pub events: Vec<RunEvent>,
    /// Called just before the terminal event is sent; the place to
    /// mimic the agent editing files (e.g. flipping a ticket to done).
    pub before_terminal: Option<TurnHook>,
    /// After sending all events, wait for cancellation instead of
    /// closing the stream.
    pub hold_open: bool,
}

/// Scripted backend; clone the `Arc` freely.
pub struct FakeBackend {
    id: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    prompts: Mutex<Vec<String>>,
    seen_threads: Mutex<Vec<Option<String>>>,
    ensure_ready_calls: AtomicUsize,
    ensure_ready_failures: AtomicUsize,
    closed: AtomicUsize,
}

impl FakeBackend {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            turns: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            seen_threads: Mutex::new(Vec::new()),
            ensure_ready_calls: AtomicUsize::new(0),
            ensure_ready_failures: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    /// Queue a turn with the given events.
    pub fn push_turn(&self, events: Vec<RunEvent>) {
        self.turns.lock().push_back(ScriptedTurn { events, before_terminal: None, hold_open: false });
    }

    /// Queue a turn that runs `hook` right before its terminal event.
    pub fn push_turn_with(&self, events: Vec<RunEvent>, hook: impl Fn() + Send + Sync + 'static) {
        self.turns.lock().push_back(ScriptedTurn {
            events,
            before_terminal: Some(Box::new(hook)),
            hold_open: false,
        });
    }

    /// Queue a turn that stays open after its events until cancelled.
    pub fn push_hold_open(&self, events: Vec<RunEvent>) {
        self.turns.lock().push_back(ScriptedTurn { events, before_terminal: None, hold_open: true });
    }

    /// Make the next `n` `ensure_ready` calls fail (transiently).
    pub fn fail_ensure_ready_times(&self, n: usize) {
        self.ensure_ready_failures.store(n, Ordering::SeqCst);
    }

    /// Prompts received, in turn order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Thread ids the caller pinned per turn, in turn order.
    pub fn seen_threads(&self) -> Vec<Option<String>> {
        self.seen_threads.lock().clone()
    }

    pub fn ensure_ready_calls(&self) -> usize {
        self.ensure_ready_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// A minimal successful turn: started, one delta, completed.
    pub fn simple_turn(backend_id: &str, thread_id: &str, text: &str, tickets: &[&str]) -> Vec<RunEvent> {
        vec![
            RunEvent::Started {
                backend_id: backend_id.into(),
                thread_id: thread_id.into(),
                turn_id: format!("turn-{thread_id}"),
            },
            RunEvent::Delta { text: text.into() },
            RunEvent::Completed {
                summary: text.into(),
                tickets_touched: tickets.iter().map(|t| t.to_string()).collect(),
            },
        ]
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ensure_ready(&self, workspace: &Workspace) -> Result<Handle, BackendError> {
        self.ensure_ready_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.ensure_ready_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.ensure_ready_failures.store(failures - 1, Ordering::SeqCst);
            return Err(BackendError::NotReady {
                backend_id: self.id.clone(),
                message: "scripted startup failure".into(),
            });
        }
        Ok(Handle {
            id: HandleId::new(),
            backend_id: self.id.clone(),
            workspace_key: workspace.key.clone(),
            workspace_root: workspace.repo_root.clone(),
            pid: None,
            base_url: None,
        })
    }

    async fn run_turn(
        &self,
        _handle: &Handle,
        prompt: &str,
        options: TurnOptions,
    ) -> Result<RunEventStream, BackendError> {
        self.prompts.lock().push(prompt.to_string());
        self.seen_threads.lock().push(options.thread_id);
        let turn = self.turns.lock().pop_front().unwrap_or(ScriptedTurn {
            events: Self::simple_turn(&self.id, "thr-default", "ok", &[]),
            before_terminal: None,
            hold_open: false,
        });

        let (sender, stream) = run_event_channel();
        tokio::spawn(async move {
            let cancel = sender.cancellation();
            for event in turn.events {
                if event.is_terminal() {
                    if let Some(hook) = &turn.before_terminal {
                        hook();
                    }
                }
                if sender.send(event).await.is_err() {
                    return;
                }
            }
            if turn.hold_open {
                cancel.cancelled().await;
            }
        });
        Ok(stream)
    }

    async fn close(&self, _handle: Handle) -> Result<(), BackendError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self, _handle: &Handle) -> Health {
        Health { alive: true, detail: None }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
