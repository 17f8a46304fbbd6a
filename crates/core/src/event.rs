// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow event kinds: the canonical names on every run timeline.
//!
//! The engine emits one of these at every state transition and blocking
//! point, so a run's history is reconstructible from its events alone.
//! The store persists the kind as a plain string; unknown names read back
//! as [`FlowEventKind::Other`].

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for one ticket-flow iteration within a run.
    pub struct StepId("stp-");
}

/// Canonical event names emitted by the engine onto a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventKind {
    FlowStarted,
    StepStarted,
    AgentStarted,
    AgentStreamDelta,
    TokenUsage,
    ToolCall,
    Notification,
    HandoffRequested,
    TicketDone,
    TicketsAdded,
    TicketParseError,
    LockRecovered,
    FlowPaused,
    FlowStopped,
    FlowCompleted,
    FlowFailed,
    RunSuperseded,
    /// Catch-all for event names written by newer versions or surfaces.
    #[serde(other)]
    Other,
}

impl FlowEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowEventKind::FlowStarted => "flow_started",
            FlowEventKind::StepStarted => "step_started",
            FlowEventKind::AgentStarted => "agent_started",
            FlowEventKind::AgentStreamDelta => "agent_stream_delta",
            FlowEventKind::TokenUsage => "token_usage",
            FlowEventKind::ToolCall => "tool_call",
            FlowEventKind::Notification => "notification",
            FlowEventKind::HandoffRequested => "handoff_requested",
            FlowEventKind::TicketDone => "ticket_done",
            FlowEventKind::TicketsAdded => "tickets_added",
            FlowEventKind::TicketParseError => "ticket_parse_error",
            FlowEventKind::LockRecovered => "lock_recovered",
            FlowEventKind::FlowPaused => "flow_paused",
            FlowEventKind::FlowStopped => "flow_stopped",
            FlowEventKind::FlowCompleted => "flow_completed",
            FlowEventKind::FlowFailed => "flow_failed",
            FlowEventKind::RunSuperseded => "run_superseded",
            FlowEventKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FlowEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
