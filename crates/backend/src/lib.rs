// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! car-backend: the Backend Orchestrator.
//!
//! Presents the engine with one protocol-agnostic surface: start or
//! attach to a backend for a workspace, run a single turn, and consume a
//! finite stream of normalized [`RunEvent`]s. Backend-specific wire
//! parsing lives inside each adapter; the engine never sees it.

mod backend;
mod backoff;
mod breaker;
mod destination;
mod orchestrator;
mod registry;
mod run_event;
mod server;
mod stream;
mod threads;

pub mod codex;
pub mod opencode;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use backend::{
    turn_crash_event, Backend, BackendError, Handle, HandleId, Health, TurnOptions, Workspace,
    WorkspaceKey,
};
pub use backoff::Backoff;
pub use breaker::{CircuitBreaker, CircuitOpen};
pub use destination::{container_run_args, wrap_command};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use registry::ProcessRegistry;
pub use run_event::{failure_kind, notification_kind, HandoffMode, RunEvent};
pub use stream::{run_event_channel, RunEventSender, RunEventStream, StreamClosed, STREAM_CAPACITY};
pub use threads::ThreadMap;
