// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.

use crate::prompt::PromptCaps;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_prior_tail_lines() -> usize {
    40
}

fn default_workspace_docs() -> Vec<String> {
    vec![
        "contextspace/active_context.md".to_string(),
        "contextspace/decisions.md".to_string(),
        "contextspace/spec.md".to_string(),
    ]
}

fn default_constitution() -> String {
    "You are an autonomous coding agent working through numbered tickets.\n\
     Work only on the ticket below. When it is finished, set `done: true`\n\
     in its frontmatter. Add new TICKET-NNN.md files for follow-up work\n\
     you discover but do not take on yourself."
        .to_string()
}

/// Tunables for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop the flow after this many turns.
    pub stop_after_runs: Option<u32>,
    /// Wall-clock budget for the whole run, in seconds.
    pub run_budget_secs: Option<u64>,
    /// Wall-clock budget per turn, in seconds.
    pub turn_budget_secs: Option<u64>,
    /// Prompt byte budgets.
    pub prompt: PromptCaps,
    /// How many final delta lines of the previous turn feed the next prompt.
    pub prior_tail_lines: usize,
    /// Repo-relative paths included as workspace context, in order.
    pub workspace_docs: Vec<String>,
    /// Identity header prepended to every prompt.
    pub constitution: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_after_runs: None,
            run_budget_secs: None,
            turn_budget_secs: None,
            prompt: PromptCaps::default(),
            prior_tail_lines: default_prior_tail_lines(),
            workspace_docs: default_workspace_docs(),
            constitution: default_constitution(),
        }
    }
}

impl EngineConfig {
    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }

    pub fn turn_budget(&self) -> Option<Duration> {
        self.turn_budget_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
