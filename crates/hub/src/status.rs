// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-repo status derivation.

use car_core::{checklist_progress, repo_state_root, RepoEntry, RepoId};
use car_engine::{inspect_lock, LockStatus};
use car_store::{FlowStore, RunId, RunStatus, TICKET_FLOW};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Aggregated status of one managed repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepoStatus {
    Uninitialized,
    Initializing,
    Idle,
    Running,
    Locked,
    Paused,
    Error,
    InitError,
    Missing,
}

car_core::simple_display! {
    RepoStatus {
        Uninitialized => "UNINITIALIZED",
        Initializing => "INITIALIZING",
        Idle => "IDLE",
        Running => "RUNNING",
        Locked => "LOCKED",
        Paused => "PAUSED",
        Error => "ERROR",
        InitError => "INIT_ERROR",
        Missing => "MISSING",
    }
}

/// Status snapshot for one repo, as returned by `hub.list_repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub id: RepoId,
    pub name: String,
    pub status: RepoStatus,
    pub lock: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_run: Option<RunId>,
    pub open_tickets: usize,
    pub done_tickets: usize,
    /// Checklist progress across open tickets: (checked, total).
    pub checklist: (usize, usize),
    pub enabled: bool,
    pub auto_run: bool,
}

fn ticket_counts(state_root: &Path) -> (usize, usize, (usize, usize)) {
    let mut open = 0;
    let mut done = 0;
    let mut checked = 0;
    let mut total = 0;
    let files = car_core::list_ticket_files(&state_root.join("tickets")).unwrap_or_default();
    for (_, path) in files {
        match car_core::parse_ticket(&path) {
            Ok(ticket) if ticket.front.done => done += 1,
            Ok(ticket) => {
                open += 1;
                let (c, t) = checklist_progress(&ticket.body);
                checked += c;
                total += t;
            }
            Err(_) => {}
        }
    }
    (open, done, (checked, total))
}

/// Derive the status snapshot for a manifest entry.
pub fn repo_snapshot(hub_root: &Path, entry: &RepoEntry) -> RepoSnapshot {
    let repo_root = entry.root(hub_root);
    let mut snapshot = RepoSnapshot {
        id: entry.id.clone(),
        name: entry.display_name().to_string(),
        status: RepoStatus::Idle,
        lock: LockStatus::Unlocked.to_string(),
        active_run: None,
        open_tickets: 0,
        done_tickets: 0,
        checklist: (0, 0),
        enabled: entry.enabled,
        auto_run: entry.auto_run,
    };

    if !repo_root.is_dir() {
        snapshot.status = RepoStatus::Missing;
        return snapshot;
    }

    let state_root = repo_state_root(&repo_root);
    // Init markers first: an in-flight init is INITIALIZING while its
    // worker PID is alive; a dead worker or an error marker means the
    // last init or provision failed.
    if let Some(pid) = crate::init::initializing_pid(&state_root) {
        snapshot.status = if car_core::pid_alive(pid) {
            RepoStatus::Initializing
        } else {
            RepoStatus::InitError
        };
        return snapshot;
    }
    if crate::init::read_init_error(&state_root).is_some() {
        snapshot.status = RepoStatus::InitError;
        return snapshot;
    }
    if !crate::init::is_initialized(&repo_root) {
        snapshot.status = RepoStatus::Uninitialized;
        return snapshot;
    }

    let lock = inspect_lock(&state_root);
    snapshot.lock = lock.to_string();
    let (open, done, checklist) = ticket_counts(&state_root);
    snapshot.open_tickets = open;
    snapshot.done_tickets = done;
    snapshot.checklist = checklist;

    let store = match FlowStore::open(&state_root.join("flows.db")) {
        Ok(store) => store,
        Err(_) => {
            snapshot.status = RepoStatus::Error;
            return snapshot;
        }
    };
    let active = store.active_run(TICKET_FLOW);
    snapshot.active_run = active.as_ref().map(|run| run.id.clone());

    snapshot.status = match (&active, lock) {
        (Some(run), _) if run.status == RunStatus::Paused => RepoStatus::Paused,
        (Some(_), LockStatus::LockedAlive { .. }) => RepoStatus::Running,
        // A live lock with no active run: some process owns the repo but
        // the store doesn't say why.
        (None, LockStatus::LockedAlive { .. }) => RepoStatus::Locked,
        // An active run with no live lock is awaiting its next step.
        (Some(_), _) => RepoStatus::Idle,
        (None, _) => {
            let last = store
                .list_runs(&car_store::RunFilter { limit: Some(1), ..Default::default() })
                .into_iter()
                .next();
            match last {
                Some(run) if run.status == RunStatus::Failed => RepoStatus::Error,
                _ => RepoStatus::Idle,
            }
        }
    };
    snapshot
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
