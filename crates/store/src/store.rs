// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Flow Store: the only canonical read path for run history.

use crate::log::{LogError, LogFile, Record};
use crate::types::{FlowArtifact, FlowEventRecord, FlowRun, RunId, RunStatus};
use car_core::{FlowEventKind, StepId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Flow Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Log(#[from] LogError),

    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    #[error("illegal transition for run {run_id}: {from} -> {to}")]
    IllegalTransition { run_id: RunId, from: RunStatus, to: RunStatus },

    #[error("run {0} is terminal; its timeline is frozen")]
    TerminalRun(RunId),
}

/// Filter for [`FlowStore::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub flow_type: Option<String>,
    pub statuses: Option<Vec<RunStatus>>,
    pub limit: Option<usize>,
}

struct Inner {
    log: LogFile,
    runs: HashMap<RunId, FlowRun>,
    /// Insertion order, for newest-first listings.
    run_order: Vec<RunId>,
    events: HashMap<RunId, Vec<FlowEventRecord>>,
    artifacts: HashMap<RunId, Vec<FlowArtifact>>,
    next_seq: u64,
}

impl Inner {
    fn apply(&mut self, record: Record) {
        match record {
            Record::Run { run } => {
                if !self.runs.contains_key(&run.id) {
                    self.run_order.push(run.id.clone());
                }
                self.runs.insert(run.id.clone(), run);
            }
            Record::Event { event } => {
                self.next_seq = self.next_seq.max(event.seq + 1);
                self.events.entry(event.run_id.clone()).or_default().push(event);
            }
            Record::Artifact { artifact } => {
                self.artifacts.entry(artifact.run_id.clone()).or_default().push(artifact);
            }
        }
    }

    fn run_mut(&mut self, run_id: &RunId) -> Result<&mut FlowRun, StoreError> {
        self.runs.get_mut(run_id).ok_or_else(|| StoreError::UnknownRun(run_id.clone()))
    }
}

/// Durable store of flow runs, events, and artifacts for one repo.
///
/// Cheap to clone; all clones share one writer lock. Readers snapshot
/// under the same lock, so a write that returned is visible to every
/// subsequent read in the process.
#[derive(Clone)]
pub struct FlowStore {
    inner: Arc<Mutex<Inner>>,
}

impl FlowStore {
    /// Open (creating if needed) the store file and replay it.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let (log, records) = LogFile::open(path)?;
        let mut inner = Inner {
            log,
            runs: HashMap::new(),
            run_order: Vec::new(),
            events: HashMap::new(),
            artifacts: HashMap::new(),
            next_seq: 1,
        };
        for record in records {
            inner.apply(record);
        }
        Ok(Self { inner: Arc::new(Mutex::new(inner)) })
    }

    /// Create a new run in `pending` status.
    pub fn create_run(
        &self,
        flow_type: &str,
        initial_state: serde_json::Value,
        now: &str,
    ) -> Result<FlowRun, StoreError> {
        let run = FlowRun {
            id: RunId::generate(),
            flow_type: flow_type.to_string(),
            status: RunStatus::Pending,
            created_at: now.to_string(),
            started_at: None,
            finished_at: None,
            current_step_id: None,
            state: initial_state,
            error: None,
        };
        let mut inner = self.inner.lock();
        inner.log.append(&Record::Run { run: run.clone() })?;
        inner.apply(Record::Run { run: run.clone() });
        Ok(run)
    }

    /// Transition a run's status, optionally patching its state.
    ///
    /// Terminal runs are frozen: any further transition fails with
    /// `IllegalTransition`. Entering `running` stamps `started_at` once;
    /// entering a terminal status stamps `finished_at`.
    pub fn set_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        patch: Option<serde_json::Value>,
        error: Option<String>,
        now: &str,
    ) -> Result<FlowRun, StoreError> {
        let mut inner = self.inner.lock();
        let run = inner.run_mut(run_id)?;
        if run.status.is_terminal() {
            return Err(StoreError::IllegalTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: status,
            });
        }
        run.status = status;
        if status == RunStatus::Running && run.started_at.is_none() {
            run.started_at = Some(now.to_string());
        }
        if status.is_terminal() {
            run.finished_at = Some(now.to_string());
        }
        if let Some(patch) = patch {
            merge_state(&mut run.state, patch);
        }
        if let Some(error) = error {
            run.error = Some(error);
        }
        let updated = run.clone();
        inner.log.append(&Record::Run { run: updated.clone() })?;
        Ok(updated)
    }

    /// Patch a run's `state` without changing status. Active runs only.
    pub fn patch_run_state(
        &self,
        run_id: &RunId,
        patch: serde_json::Value,
    ) -> Result<FlowRun, StoreError> {
        let mut inner = self.inner.lock();
        let run = inner.run_mut(run_id)?;
        if run.status.is_terminal() {
            return Err(StoreError::TerminalRun(run_id.clone()));
        }
        merge_state(&mut run.state, patch);
        let updated = run.clone();
        inner.log.append(&Record::Run { run: updated.clone() })?;
        Ok(updated)
    }

    /// Record the step a run is currently executing.
    pub fn set_current_step(
        &self,
        run_id: &RunId,
        step_id: Option<StepId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let run = inner.run_mut(run_id)?;
        if run.status.is_terminal() {
            return Err(StoreError::TerminalRun(run_id.clone()));
        }
        run.current_step_id = step_id;
        let updated = run.clone();
        inner.log.append(&Record::Run { run: updated })?;
        Ok(())
    }

    /// Append an event to a run's timeline; returns the assigned `seq`.
    ///
    /// Refused once the run is terminal; a frozen timeline is what makes
    /// replay trustworthy.
    pub fn append_event(
        &self,
        run_id: &RunId,
        kind: FlowEventKind,
        data: serde_json::Value,
        step_id: Option<StepId>,
        now: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let run = inner.runs.get(run_id).ok_or_else(|| StoreError::UnknownRun(run_id.clone()))?;
        if run.status.is_terminal() {
            return Err(StoreError::TerminalRun(run_id.clone()));
        }
        let seq = inner.next_seq;
        let event = FlowEventRecord {
            seq,
            run_id: run_id.clone(),
            event_type: kind.as_str().to_string(),
            timestamp: now.to_string(),
            step_id,
            data,
        };
        inner.log.append(&Record::Event { event: event.clone() })?;
        inner.apply(Record::Event { event });
        Ok(seq)
    }

    /// Record an artifact pointer for a run.
    pub fn record_artifact(
        &self,
        run_id: &RunId,
        kind: &str,
        path: &Path,
        metadata: serde_json::Value,
        now: &str,
    ) -> Result<FlowArtifact, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.runs.contains_key(run_id) {
            return Err(StoreError::UnknownRun(run_id.clone()));
        }
        let artifact = FlowArtifact {
            run_id: run_id.clone(),
            kind: kind.to_string(),
            path: path.to_path_buf(),
            created_at: now.to_string(),
            metadata,
        };
        inner.log.append(&Record::Artifact { artifact: artifact.clone() })?;
        inner.apply(Record::Artifact { artifact: artifact.clone() });
        Ok(artifact)
    }

    /// Fetch one run by id.
    pub fn get_run(&self, run_id: &RunId) -> Option<FlowRun> {
        self.inner.lock().runs.get(run_id).cloned()
    }

    /// List runs newest-first, optionally filtered.
    pub fn list_runs(&self, filter: &RunFilter) -> Vec<FlowRun> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for id in inner.run_order.iter().rev() {
            let Some(run) = inner.runs.get(id) else { continue };
            if let Some(flow_type) = &filter.flow_type {
                if &run.flow_type != flow_type {
                    continue;
                }
            }
            if let Some(statuses) = &filter.statuses {
                if !statuses.contains(&run.status) {
                    continue;
                }
            }
            out.push(run.clone());
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// The single active (`pending|running|paused`) run of a flow type, if any.
    pub fn active_run(&self, flow_type: &str) -> Option<FlowRun> {
        self.list_runs(&RunFilter {
            flow_type: Some(flow_type.to_string()),
            statuses: Some(vec![RunStatus::Pending, RunStatus::Running, RunStatus::Paused]),
            limit: Some(1),
        })
        .into_iter()
        .next()
    }

    /// Events for a run ordered by `seq`, optionally after a cursor
    /// and/or restricted to certain event types.
    pub fn get_events(
        &self,
        run_id: &RunId,
        after_seq: Option<u64>,
        types: Option<&[&str]>,
    ) -> Vec<FlowEventRecord> {
        let inner = self.inner.lock();
        let Some(events) = inner.events.get(run_id) else { return Vec::new() };
        events
            .iter()
            .filter(|e| after_seq.map(|cursor| e.seq > cursor).unwrap_or(true))
            .filter(|e| types.map(|ts| ts.contains(&e.event_type.as_str())).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Artifacts recorded for a run, in insertion order.
    pub fn get_artifacts(&self, run_id: &RunId) -> Vec<FlowArtifact> {
        self.inner.lock().artifacts.get(run_id).cloned().unwrap_or_default()
    }
}

/// Shallow-merge `patch` object keys into `state`; a null key deletes.
fn merge_state(state: &mut serde_json::Value, patch: serde_json::Value) {
    let serde_json::Value::Object(patch) = patch else {
        *state = patch;
        return;
    };
    if !state.is_object() {
        *state = serde_json::Value::Object(Default::default());
    }
    if let serde_json::Value::Object(map) = state {
        for (key, value) in patch {
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
