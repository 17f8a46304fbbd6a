// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types for the three logical tables: runs, events, artifacts.

use car_core::{FlowEventKind, StepId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The only flow type the engine currently drives.
pub const TICKET_FLOW: &str = "ticket_flow";

/// Identifier for one flow run. UUID-backed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for log lines.
    pub fn short(&self) -> &str {
        car_core::short(&self.0, 8)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for RunId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Status of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
    Superseded,
}

car_core::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Stopped => "stopped",
        Superseded => "superseded",
    }
}

impl RunStatus {
    /// Terminal runs are frozen: no further status, state, or event writes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped | RunStatus::Superseded
        )
    }

    /// Active runs block a new `start` without `force_new`.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running | RunStatus::Paused)
    }
}

/// One execution of a flow state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
    pub id: RunId,
    pub flow_type: String,
    pub status: RunStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<StepId>,
    /// Arbitrary engine-owned state (stop flag, current ticket, turn counts).
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One immutable record on a run's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEventRecord {
    /// Strictly increasing per store, assigned at insert.
    pub seq: u64,
    pub run_id: RunId,
    pub event_type: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl FlowEventRecord {
    /// Typed view of `event_type`; unknown names map to `Other`.
    pub fn kind(&self) -> FlowEventKind {
        serde_json::from_value(serde_json::Value::String(self.event_type.clone()))
            .unwrap_or(FlowEventKind::Other)
    }
}

/// Pointer to an on-disk file produced by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowArtifact {
    pub run_id: RunId,
    pub kind: String,
    pub path: PathBuf,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
