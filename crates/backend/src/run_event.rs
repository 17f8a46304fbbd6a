// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The normalized event contract every backend adapter produces.
//!
//! A turn's stream is finite: it carries zero or more progress events and
//! ends with exactly one terminal event (`Completed` or `Failed`). A
//! stream that ends without a terminal event is a crashed turn; the
//! engine, not the adapter, decides what to do about that.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Well-known `Failed.kind` values.
pub mod failure_kind {
    /// Stream ended without a terminal event.
    pub const TURN_CRASH: &str = "turn_crash";
    /// `ensure_ready` exhausted its retry budget.
    pub const BACKEND_START: &str = "backend_start";
    /// The backend reported an unrecoverable error of its own.
    pub const AGENT: &str = "agent";
}

/// Well-known `Notification.kind` values.
pub mod notification_kind {
    /// Backend is rate limited; payload carries `cooldown_seconds`.
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// How a handoff interrupts the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffMode {
    /// Halt the flow until a human resumes it.
    Pause,
    /// Inform the human; the flow keeps going.
    Notify,
}

car_core::simple_display! {
    HandoffMode {
        Pause => "pause",
        Notify => "notify",
    }
}

/// Normalized, protocol-agnostic event produced by any backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// First event of every turn; carries the conversation identity.
    Started { backend_id: String, thread_id: String, turn_id: String },

    /// Streamed agent output text.
    Delta { text: String },

    /// Cumulative token accounting for the conversation.
    TokenUsage {
        total_tokens: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_context_window: Option<u64>,
    },

    /// A tool invocation surfaced by the backend.
    ToolCall {
        name: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },

    /// Backend-specific payload kept opaque behind a kind tag.
    Notification { kind: String, payload: serde_json::Value },

    /// The agent asks for human input.
    HandoffRequested {
        mode: HandoffMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<PathBuf>,
    },

    /// Terminal: the turn finished.
    Completed {
        summary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tickets_touched: Vec<String>,
    },

    /// Terminal: the turn failed.
    Failed { kind: String, message: String, recoverable: bool },
}

impl RunEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Completed { .. } | RunEvent::Failed { .. })
    }

    /// Event name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Started { .. } => "started",
            RunEvent::Delta { .. } => "delta",
            RunEvent::TokenUsage { .. } => "token_usage",
            RunEvent::ToolCall { .. } => "tool_call",
            RunEvent::Notification { .. } => "notification",
            RunEvent::HandoffRequested { .. } => "handoff_requested",
            RunEvent::Completed { .. } => "completed",
            RunEvent::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
#[path = "run_event_tests.rs"]
mod tests;
