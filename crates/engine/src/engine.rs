// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ticket-flow engine.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lock::{AcquireError, RepoLock};
use crate::prompt::{compose_prompt, PromptDoc, PromptInputs};
use crate::run_log::RunLog;
use car_backend::{
    failure_kind, HandoffMode, Orchestrator, OrchestratorError, RunEvent, TurnOptions, Workspace,
    WorkspaceKey,
};
use car_core::{repo_state_root, Clock, Destination, FlowEventKind, RepoId, StepId, Ticket};
use car_store::{FlowRun, FlowStore, RunId, RunStatus, TICKET_FLOW};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of `start`.
#[derive(Debug)]
pub enum StartOutcome {
    /// A fresh run was created.
    Created(FlowRun),
    /// An active run already exists and was handed back.
    Reused(FlowRun),
}

impl StartOutcome {
    pub fn run(&self) -> &FlowRun {
        match self {
            StartOutcome::Created(run) | StartOutcome::Reused(run) => run,
        }
    }

    /// Hint string surfaced to callers, e.g. over the hub API.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            StartOutcome::Created(_) => None,
            StartOutcome::Reused(_) => Some("active_run_reused"),
        }
    }
}

/// Result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Turn done, open tickets remain; keep stepping.
    TurnDone,
    /// No open tickets; the flow completed.
    Completed,
    /// Backend requested a pause handoff.
    Paused,
    /// Stop flag observed (user stop or budget); flow stopped.
    Stopped,
    /// Unrecoverable failure; flow failed.
    Failed,
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::TurnDone)
    }
}

/// Per-repo ticket-flow engine. Holds no mutable global state.
pub struct Engine<C: Clock> {
    repo_id: RepoId,
    repo_root: PathBuf,
    state_root: PathBuf,
    store: FlowStore,
    orchestrator: Arc<Orchestrator>,
    destination: Destination,
    config: EngineConfig,
    clock: C,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        repo_id: RepoId,
        repo_root: PathBuf,
        orchestrator: Arc<Orchestrator>,
        destination: Destination,
        config: EngineConfig,
        clock: C,
    ) -> Result<Self, EngineError> {
        destination.validate().map_err(|e| EngineError::Config(e.to_string()))?;
        let state_root = repo_state_root(&repo_root);
        let store = FlowStore::open(&state_root.join("flows.db"))?;
        Ok(Self { repo_id, repo_root, state_root, store, orchestrator, destination, config, clock })
    }

    pub fn repo_id(&self) -> &RepoId {
        &self.repo_id
    }

    pub fn store(&self) -> &FlowStore {
        &self.store
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// Tickets live under the repo state root.
    pub fn tickets_dir(&self) -> PathBuf {
        self.state_root.join("tickets")
    }

    fn now(&self) -> String {
        self.clock.timestamp()
    }

    fn workspace(&self) -> Workspace {
        Workspace {
            key: WorkspaceKey::ticket_flow(self.repo_id.as_str()),
            repo_root: self.repo_root.clone(),
            state_root: self.state_root.clone(),
            destination: self.destination.clone(),
        }
    }

    /// Start the ticket flow.
    ///
    /// With an active run present: `force_new = false` hands it back
    /// (`active_run_reused`, no events); `force_new = true` marks it
    /// superseded, sets its stop flag for any live loop, clears the
    /// lock, and creates a fresh run.
    pub fn start(&self, force_new: bool) -> Result<StartOutcome, EngineError> {
        if let Some(active) = self.store.active_run(TICKET_FLOW) {
            if !force_new {
                return Ok(StartOutcome::Reused(active));
            }
            let now = self.now();
            // Stop flag first: a live engine loop sees it between events
            // even before it notices the terminal status.
            self.store.patch_run_state(&active.id, serde_json::json!({"stop_requested": true}))?;
            self.store.append_event(
                &active.id,
                FlowEventKind::RunSuperseded,
                serde_json::json!({ "reason": "force_new" }),
                None,
                &now,
            )?;
            self.store.set_run_status(&active.id, RunStatus::Superseded, None, None, &now)?;
            let lock_file = crate::lock::lock_path(&self.state_root);
            if lock_file.exists() {
                std::fs::remove_file(&lock_file)
                    .map_err(|e| EngineError::Io { path: lock_file, source: e })?;
            }
            tracing::info!(repo = %self.repo_id, run = %active.id.short(), "run superseded");
        }

        let now = self.now();
        let initial_state = serde_json::json!({
            "stop_requested": false,
            "run_started_epoch_ms": self.clock.epoch_ms(),
            "ticket_engine": {
                "current_ticket": serde_json::Value::Null,
                "ticket_turns": 0,
                "reason": serde_json::Value::Null,
            },
        });
        let run = self.store.create_run(TICKET_FLOW, initial_state, &now)?;
        self.store.append_event(
            &run.id,
            FlowEventKind::FlowStarted,
            serde_json::json!({ "repo_id": self.repo_id.as_str() }),
            None,
            &now,
        )?;
        tracing::info!(repo = %self.repo_id, run = %run.id.short(), "flow started");
        Ok(StartOutcome::Created(run))
    }

    /// Request a cooperative stop. Acknowledged by `flow_stopped` when the
    /// engine loop observes the flag.
    pub fn stop(&self, run_id: &RunId) -> Result<(), EngineError> {
        self.store.patch_run_state(run_id, serde_json::json!({"stop_requested": true}))?;
        Ok(())
    }

    /// Resume a paused run and drive it until a terminal outcome.
    pub async fn resume(&self, run_id: &RunId) -> Result<StepOutcome, EngineError> {
        let run = self
            .store
            .get_run(run_id)
            .ok_or_else(|| EngineError::UnknownRun(run_id.clone()))?;
        if run.status != RunStatus::Paused {
            return Err(EngineError::IllegalTransition {
                run_id: run_id.clone(),
                expected: "paused",
                actual: run.status.to_string(),
            });
        }
        if let crate::lock::LockStatus::LockedAlive { pid } = crate::lock::inspect_lock(&self.state_root)
        {
            return Err(EngineError::LockedAlive { pid });
        }
        self.store.set_run_status(run_id, RunStatus::Running, None, None, &self.now())?;
        self.run_loop(run_id).await
    }

    /// Step until the flow leaves the running state.
    pub async fn run_loop(&self, run_id: &RunId) -> Result<StepOutcome, EngineError> {
        loop {
            let outcome = self.step(run_id).await?;
            if outcome.is_terminal() {
                return Ok(outcome);
            }
        }
    }

    /// One ticket-flow iteration.
    pub async fn step(&self, run_id: &RunId) -> Result<StepOutcome, EngineError> {
        let run = self
            .store
            .get_run(run_id)
            .ok_or_else(|| EngineError::UnknownRun(run_id.clone()))?;
        if run.status.is_terminal() {
            return Err(EngineError::IllegalTransition {
                run_id: run_id.clone(),
                expected: "active",
                actual: run.status.to_string(),
            });
        }

        // Lock first; refuse without events when a live engine owns it.
        let acquired = match RepoLock::acquire(&self.state_root, &self.now()) {
            Ok(acquired) => acquired,
            Err(AcquireError::Held { pid }) => return Err(EngineError::LockedAlive { pid }),
            Err(AcquireError::Io { path, source }) => {
                return Err(EngineError::Io { path, source })
            }
        };
        let lock = acquired.lock;
        if let Some(stale_pid) = acquired.recovered_from {
            self.store.append_event(
                run_id,
                FlowEventKind::LockRecovered,
                serde_json::json!({ "stale_pid": stale_pid }),
                None,
                &self.now(),
            )?;
            tracing::info!(repo = %self.repo_id, stale_pid, "stale lock recovered");
        }

        if run.status == RunStatus::Pending {
            self.store.set_run_status(run_id, RunStatus::Running, None, None, &self.now())?;
        }

        let outcome = self.step_locked(run_id).await;
        if let Err(e) = lock.release() {
            tracing::warn!(repo = %self.repo_id, error = %e, "lock release failed");
        }
        outcome
    }

    /// The body of a step, run while holding the repo lock.
    async fn step_locked(&self, run_id: &RunId) -> Result<StepOutcome, EngineError> {
        if self.stop_requested(run_id) {
            return self.finish_stopped(run_id, "user_stop");
        }
        if let Some(reason) = self.budget_exceeded(run_id) {
            return self.finish_stopped(run_id, reason);
        }

        // Select the lowest-numbered open ticket, skipping unparsable ones.
        let Some(ticket) = self.select_ticket(run_id)? else {
            let now = self.now();
            self.store.append_event(
                run_id,
                FlowEventKind::FlowCompleted,
                serde_json::json!({}),
                None,
                &now,
            )?;
            self.store.set_run_status(run_id, RunStatus::Completed, None, None, &now)?;
            tracing::info!(repo = %self.repo_id, run = %run_id.short(), "flow completed");
            return Ok(StepOutcome::Completed);
        };

        let step_id = StepId::new();
        self.store.set_current_step(run_id, Some(step_id.clone()))?;
        self.store.append_event(
            run_id,
            FlowEventKind::StepStarted,
            serde_json::json!({
                "ticket": ticket.reference(),
                "path": ticket.path,
                "agent": ticket.front.agent,
            }),
            Some(step_id.clone()),
            &self.now(),
        )?;
        self.store.patch_run_state(
            run_id,
            serde_json::json!({ "ticket_engine": self.ticket_engine_state(run_id, Some(&ticket)) }),
        )?;

        let prompt = self.build_prompt(run_id, &ticket)?;
        let known_before = self.known_ticket_numbers()?;

        // Drive the turn.
        let stream = match self
            .orchestrator
            .run_turn(
                &ticket.front.agent,
                &self.workspace(),
                &prompt,
                TurnOptions { thread_id: None, turn_timeout: self.config.turn_budget() },
            )
            .await
        {
            Ok(stream) => stream,
            Err(OrchestratorError::StartFailure { agent, attempts, message }) => {
                return self.finish_failed(
                    run_id,
                    failure_kind::BACKEND_START,
                    &format!("backend {agent} failed to start after {attempts} attempts: {message}"),
                    false,
                );
            }
            Err(e @ OrchestratorError::CircuitOpen { .. }) => {
                return self.finish_failed(run_id, failure_kind::BACKEND_START, &e.to_string(), false);
            }
            Err(e) => return Err(e.into()),
        };

        let turn = self.pump_events(run_id, &step_id, stream).await?;

        match turn {
            TurnEnd::Stopped { reason } => self.finish_stopped(run_id, reason),
            TurnEnd::Failed { kind, message, recoverable } => {
                self.finish_failed(run_id, &kind, &message, recoverable)
            }
            TurnEnd::Paused => {
                let now = self.now();
                self.store.set_run_status(run_id, RunStatus::Paused, None, None, &now)?;
                tracing::info!(repo = %self.repo_id, run = %run_id.short(), "flow paused on handoff");
                Ok(StepOutcome::Paused)
            }
            TurnEnd::Crashed => self.finish_failed(
                run_id,
                failure_kind::TURN_CRASH,
                "backend stream ended without a terminal event",
                true,
            ),
            TurnEnd::Completed { tickets_touched, tail } => {
                self.after_completed_turn(run_id, &ticket, &tickets_touched, &known_before, tail)?;
                if self.stop_requested(run_id) {
                    return self.finish_stopped(run_id, "user_stop");
                }
                if let Some(reason) = self.budget_exceeded(run_id) {
                    return self.finish_stopped(run_id, reason);
                }
                Ok(StepOutcome::TurnDone)
            }
        }
    }

    /// Read the backend stream to its end, persisting every event.
    async fn pump_events(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        mut stream: car_backend::RunEventStream,
    ) -> Result<TurnEnd, EngineError> {
        let mut run_log = RunLog::open(&self.state_root, run_id)
            .map_err(|e| EngineError::Io { path: self.state_root.join("runs"), source: e })?;
        let mut tail: Vec<String> = Vec::new();
        let mut pause_requested = false;
        let mut terminal: Option<RunEvent> = None;
        let turn_deadline = self.config.turn_budget().map(|d| self.clock.now() + d);

        loop {
            // Budget check between events; the stop flag is the engine's
            // only cancellation channel, the stream cancel its lever.
            if self.stop_requested(run_id) {
                stream.cancel();
                while stream.next().await.is_some() {}
                let _ = run_log.marker("stopped");
                let _ = run_log.flush();
                self.record_run_log(run_id, run_log.path())?;
                return Ok(TurnEnd::Stopped { reason: "user_stop" });
            }
            if let Some(deadline) = turn_deadline {
                if self.clock.now() >= deadline {
                    stream.cancel();
                    while stream.next().await.is_some() {}
                    let _ = run_log.marker("turn budget exceeded");
                    let _ = run_log.flush();
                    self.record_run_log(run_id, run_log.path())?;
                    return Ok(TurnEnd::Stopped { reason: "turn_budget_exceeded" });
                }
            }

            // Tick while waiting so an externally-set stop flag can
            // interrupt an idle stream, not just a chatty one.
            let event = tokio::select! {
                event = stream.next() => event,
                _ = tokio::time::sleep(std::time::Duration::from_millis(250)) => continue,
            };
            let Some(event) = event else { break };

            // Terminal stream events become flow-level events
            // (`ticket_done`, `flow_failed`, ...) after the turn; writing
            // them twice would muddy the timeline.
            if event.is_terminal() {
                terminal = Some(event);
                break;
            }

            let kind = flow_kind_for(&event);
            let data = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
            self.store.append_event(run_id, kind, data, Some(step_id.clone()), &self.now())?;

            match &event {
                RunEvent::Delta { text } => {
                    let _ = run_log.append(text);
                    for line in text.lines() {
                        tail.push(line.to_string());
                    }
                    let keep = self.config.prior_tail_lines;
                    if tail.len() > keep {
                        tail.drain(..tail.len() - keep);
                    }
                }
                RunEvent::HandoffRequested { mode: HandoffMode::Pause, .. } => {
                    pause_requested = true;
                }
                _ => {}
            }
        }

        let _ = run_log.flush();
        self.record_run_log(run_id, run_log.path())?;

        Ok(match terminal {
            Some(RunEvent::Completed { tickets_touched, .. }) => {
                if pause_requested {
                    TurnEnd::Paused
                } else {
                    TurnEnd::Completed { tickets_touched, tail }
                }
            }
            Some(RunEvent::Failed { kind, message, recoverable }) => {
                TurnEnd::Failed { kind, message, recoverable }
            }
            Some(_) => TurnEnd::Crashed,
            None if pause_requested => TurnEnd::Paused,
            None => TurnEnd::Crashed,
        })
    }

    /// Bookkeeping after a successfully completed turn.
    fn after_completed_turn(
        &self,
        run_id: &RunId,
        ticket: &Ticket,
        tickets_touched: &[String],
        known_before: &[u32],
        tail: Vec<String>,
    ) -> Result<(), EngineError> {
        let now = self.now();

        // Ticket status authority is the file on disk: emit ticket_done
        // only for tickets whose frontmatter actually flipped.
        let mut touched = tickets_touched.to_vec();
        if !touched.contains(&ticket.reference()) {
            touched.push(ticket.reference());
        }
        for reference in &touched {
            let Some(number) = car_core::ticket::ticket_number(&format!("{reference}.md")) else {
                continue;
            };
            let path = self.tickets_dir().join(Ticket::file_name(number));
            match car_core::parse_ticket(&path) {
                Ok(parsed) if parsed.front.done => {
                    self.store.append_event(
                        run_id,
                        FlowEventKind::TicketDone,
                        serde_json::json!({ "ticket": reference }),
                        None,
                        &now,
                    )?;
                    tracing::info!(repo = %self.repo_id, ticket = %reference, "ticket done");
                }
                _ => {}
            }
        }

        // New ticket files written by the agent.
        let known_after = self.known_ticket_numbers()?;
        let added: Vec<String> = known_after
            .iter()
            .filter(|n| !known_before.contains(n))
            .map(|n| format!("{}{:03}", car_core::ticket::TICKET_PREFIX, n))
            .collect();
        if !added.is_empty() {
            self.store.append_event(
                run_id,
                FlowEventKind::TicketsAdded,
                serde_json::json!({ "tickets": added }),
                None,
                &now,
            )?;
        }

        let turns = self.ticket_turns(run_id) + 1;
        self.store.patch_run_state(
            run_id,
            serde_json::json!({
                "ticket_engine": {
                    "current_ticket": ticket.reference(),
                    "ticket_turns": turns,
                    "reason": serde_json::Value::Null,
                },
                "last_delta_tail": tail,
            }),
        )?;
        Ok(())
    }

    /// Move finished tickets into the run's artifact directory.
    pub fn archive(&self, run_id: &RunId) -> Result<Vec<PathBuf>, EngineError> {
        let run = self
            .store
            .get_run(run_id)
            .ok_or_else(|| EngineError::UnknownRun(run_id.clone()))?;
        if !run.status.is_terminal() {
            return Err(EngineError::IllegalTransition {
                run_id: run_id.clone(),
                expected: "terminal",
                actual: run.status.to_string(),
            });
        }
        let archive_dir = RunLog::run_dir(&self.state_root, run_id).join("tickets");
        std::fs::create_dir_all(&archive_dir)
            .map_err(|e| EngineError::Io { path: archive_dir.clone(), source: e })?;
        let mut archived = Vec::new();
        for (number, path) in car_core::list_ticket_files(&self.tickets_dir())? {
            let Ok(ticket) = car_core::parse_ticket(&path) else { continue };
            if !ticket.front.done {
                continue;
            }
            let dest = archive_dir.join(Ticket::file_name(number));
            std::fs::rename(&path, &dest)
                .map_err(|e| EngineError::Io { path: path.clone(), source: e })?;
            self.store.record_artifact(
                run_id,
                "archived_ticket",
                &dest,
                serde_json::json!({ "ticket": ticket.reference() }),
                &self.now(),
            )?;
            archived.push(dest);
        }
        Ok(archived)
    }

    // --- helpers ---

    fn select_ticket(&self, run_id: &RunId) -> Result<Option<Ticket>, EngineError> {
        for (_, path) in car_core::list_ticket_files(&self.tickets_dir())? {
            match car_core::parse_ticket(&path) {
                Ok(ticket) if !ticket.front.done => return Ok(Some(ticket)),
                Ok(_) => continue,
                Err(e) => {
                    let (line, message) = match &e {
                        car_core::TicketError::Frontmatter { line, message, .. } => {
                            (Some(*line), message.clone())
                        }
                        other => (None, other.to_string()),
                    };
                    self.store.append_event(
                        run_id,
                        FlowEventKind::TicketParseError,
                        serde_json::json!({
                            "path": e.path(),
                            "line": line,
                            "message": message,
                        }),
                        None,
                        &self.now(),
                    )?;
                    tracing::warn!(path = %e.path().display(), "skipping unparsable ticket");
                }
            }
        }
        Ok(None)
    }

    fn known_ticket_numbers(&self) -> Result<Vec<u32>, EngineError> {
        Ok(car_core::list_ticket_files(&self.tickets_dir())?
            .into_iter()
            .map(|(n, _)| n)
            .collect())
    }

    fn build_prompt(&self, run_id: &RunId, ticket: &Ticket) -> Result<String, EngineError> {
        let mut docs = Vec::new();
        for rel in &self.config.workspace_docs {
            let path = self.state_root.join(rel);
            match std::fs::read_to_string(&path) {
                Ok(content) => docs.push(PromptDoc { name: rel.clone(), content }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(EngineError::Io { path, source: e }),
            }
        }
        let tail: Vec<String> = self
            .store
            .get_run(run_id)
            .and_then(|run| {
                run.state
                    .get("last_delta_tail")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
            })
            .unwrap_or_default();
        let inputs = PromptInputs {
            constitution: &self.config.constitution,
            workspace_docs: &docs,
            prior_tail: &tail,
            ticket,
        };
        Ok(compose_prompt(&inputs, &self.config.prompt))
    }

    fn stop_requested(&self, run_id: &RunId) -> bool {
        self.store
            .get_run(run_id)
            .and_then(|run| run.state.get("stop_requested").and_then(|v| v.as_bool()))
            .unwrap_or(false)
    }

    fn ticket_turns(&self, run_id: &RunId) -> u64 {
        self.store
            .get_run(run_id)
            .and_then(|run| {
                run.state
                    .get("ticket_engine")
                    .and_then(|te| te.get("ticket_turns"))
                    .and_then(|v| v.as_u64())
            })
            .unwrap_or(0)
    }

    fn ticket_engine_state(&self, run_id: &RunId, current: Option<&Ticket>) -> serde_json::Value {
        serde_json::json!({
            "current_ticket": current.map(|t| t.reference()),
            "ticket_turns": self.ticket_turns(run_id),
            "reason": serde_json::Value::Null,
        })
    }

    fn budget_exceeded(&self, run_id: &RunId) -> Option<&'static str> {
        if let Some(limit) = self.config.stop_after_runs {
            if self.ticket_turns(run_id) >= u64::from(limit) {
                return Some("stop_after_runs_exceeded");
            }
        }
        if let Some(budget) = self.config.run_budget() {
            let started = self
                .store
                .get_run(run_id)
                .and_then(|run| run.state.get("run_started_epoch_ms").and_then(|v| v.as_u64()));
            if let Some(started) = started {
                if self.clock.epoch_ms().saturating_sub(started) >= budget.as_millis() as u64 {
                    return Some("run_budget_exceeded");
                }
            }
        }
        None
    }

    fn record_run_log(&self, run_id: &RunId, path: &Path) -> Result<(), EngineError> {
        // One artifact row per run is enough; re-recording on every turn
        // would bloat the artifact table with duplicates.
        let already = self
            .store
            .get_artifacts(run_id)
            .iter()
            .any(|a| a.kind == "run_log");
        if !already {
            self.store.record_artifact(
                run_id,
                "run_log",
                path,
                serde_json::Value::Null,
                &self.now(),
            )?;
        }
        Ok(())
    }

    fn finish_stopped(
        &self,
        run_id: &RunId,
        reason: &'static str,
    ) -> Result<StepOutcome, EngineError> {
        let now = self.now();
        self.store.append_event(
            run_id,
            FlowEventKind::FlowStopped,
            serde_json::json!({ "reason": reason }),
            None,
            &now,
        )?;
        self.store.set_run_status(
            run_id,
            RunStatus::Stopped,
            Some(serde_json::json!({ "ticket_engine": { "reason": reason } })),
            None,
            &now,
        )?;
        tracing::info!(repo = %self.repo_id, run = %run_id.short(), reason, "flow stopped");
        Ok(StepOutcome::Stopped)
    }

    fn finish_failed(
        &self,
        run_id: &RunId,
        kind: &str,
        message: &str,
        recoverable: bool,
    ) -> Result<StepOutcome, EngineError> {
        let now = self.now();
        self.store.append_event(
            run_id,
            FlowEventKind::FlowFailed,
            serde_json::json!({ "kind": kind, "message": message, "recoverable": recoverable }),
            None,
            &now,
        )?;
        self.store.set_run_status(
            run_id,
            RunStatus::Failed,
            None,
            Some(format!("{kind}: {message}")),
            &now,
        )?;
        tracing::warn!(repo = %self.repo_id, run = %run_id.short(), kind, message, "flow failed");
        Ok(StepOutcome::Failed)
    }
}

/// How a turn's stream ended.
enum TurnEnd {
    Completed { tickets_touched: Vec<String>, tail: Vec<String> },
    Failed { kind: String, message: String, recoverable: bool },
    Paused,
    Crashed,
    Stopped { reason: &'static str },
}

/// Flow event name for a normalized, non-terminal RunEvent.
fn flow_kind_for(event: &RunEvent) -> FlowEventKind {
    match event {
        RunEvent::Started { .. } => FlowEventKind::AgentStarted,
        RunEvent::Delta { .. } => FlowEventKind::AgentStreamDelta,
        RunEvent::TokenUsage { .. } => FlowEventKind::TokenUsage,
        RunEvent::ToolCall { .. } => FlowEventKind::ToolCall,
        RunEvent::Notification { .. } => FlowEventKind::Notification,
        RunEvent::HandoffRequested { .. } => FlowEventKind::HandoffRequested,
        // Terminal events are folded into flow-level outcomes instead.
        RunEvent::Completed { .. } => FlowEventKind::Other,
        RunEvent::Failed { .. } => FlowEventKind::Other,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
