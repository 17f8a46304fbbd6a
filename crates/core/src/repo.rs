// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repo entries: one managed repository (or worktree) in the hub manifest.

use crate::destination::Destination;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable identifier for a managed repository.
///
/// Assigned at discovery time from the directory basename and never
/// rewritten afterwards, so run history and locks stay attached even if
/// the display name drifts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for RepoId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether an entry is a primary checkout or a linked worktree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Base,
    Worktree,
}

crate::simple_display! {
    RepoKind {
        Base => "base",
        Worktree => "worktree",
    }
}

fn default_enabled() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

/// One managed repository in the hub manifest.
///
/// Created by discovery or an explicit manifest entry; mutated only via
/// manifest operations; removed only by explicit user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub id: RepoId,
    /// Filesystem path relative to the hub root.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "is_default_kind")]
    pub kind: RepoKind,
    /// For worktrees: the entry this worktree was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_repo_id: Option<RepoId>,
    /// For worktrees: the checked-out branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_run: bool,
    /// Shell commands run in a fresh worktree after creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worktree_setup_commands: Vec<String>,
}

fn is_default_kind(kind: &RepoKind) -> bool {
    *kind == RepoKind::Base
}

impl RepoEntry {
    /// New base-repo entry with discovery defaults.
    pub fn base(id: RepoId, path: PathBuf) -> Self {
        Self {
            id,
            path,
            kind: RepoKind::Base,
            base_repo_id: None,
            branch: None,
            destination: None,
            enabled: true,
            auto_run: false,
            worktree_setup_commands: Vec::new(),
        }
    }

    /// Display name: the directory basename.
    pub fn display_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Absolute repo root given the hub root.
    pub fn root(&self, hub_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            hub_root.join(&self.path)
        }
    }

    /// Effective destination, falling back through the base entry.
    ///
    /// Worktrees inherit the base repo's destination unless overridden.
    pub fn effective_destination<'a>(&'a self, base: Option<&'a RepoEntry>) -> &'a Destination {
        if let Some(dest) = &self.destination {
            return dest;
        }
        if let Some(base_dest) = base.and_then(|b| b.destination.as_ref()) {
            return base_dest;
        }
        &Destination::Local
    }
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
