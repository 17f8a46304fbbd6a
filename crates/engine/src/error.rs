// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Expected concurrency outcomes (`LockedAlive`) and contract violations
//! (`IllegalTransition`) are distinct variants, never panics. Errors
//! caught inside a step become flow events; these are the ones that
//! escape to the caller.

use car_store::{RunId, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("repo lock held by live pid {pid}")]
    LockedAlive { pid: i32 },

    #[error("run {run_id} is {actual}; expected {expected}")]
    IllegalTransition { run_id: RunId, expected: &'static str, actual: String },

    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Orchestrator(#[from] car_backend::OrchestratorError),

    #[error(transparent)]
    Ticket(#[from] car_core::TicketError),

    #[error("engine I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Process exit code for surfaces that map errors directly.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Config(_) => 2,
            _ => 1,
        }
    }
}
