// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree lifecycle: create, set up, clean up.

use crate::error::HubError;
use crate::init::init_repo;
use car_backend::wrap_command;
use car_core::{RepoEntry, RepoId, RepoKind};
use std::path::{Path, PathBuf};
use tokio::process::Command;

async fn git(args: &[&str], cwd: &Path) -> Result<String, HubError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| HubError::Git { message: format!("failed to run git: {e}") })?;
    if !output.status.success() {
        return Err(HubError::Git {
            message: format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn sanitize(branch: &str) -> String {
    branch
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Create the git checkout for a worktree and build its entry.
///
/// The worktree directory lands next to the base repo under the hub
/// root. Provisioning (state root, setup commands) is a separate step
/// so the caller can track the entry first; a failed provision then
/// surfaces as `INIT_ERROR` instead of vanishing.
pub async fn create_checkout(
    hub_root: &Path,
    base: &RepoEntry,
    branch: &str,
    dir_name: Option<&str>,
) -> Result<RepoEntry, HubError> {
    let name = dir_name
        .map(String::from)
        .unwrap_or_else(|| format!("{}-wt-{}", base.id, sanitize(branch)));
    let worktree_root = hub_root.join(&name);
    let base_root = base.root(hub_root);

    git(
        &["worktree", "add", &worktree_root.display().to_string(), "-b", branch],
        &base_root,
    )
    .await?;

    Ok(RepoEntry {
        id: RepoId::new(&name),
        path: PathBuf::from(&name),
        kind: RepoKind::Worktree,
        base_repo_id: Some(base.id.clone()),
        branch: Some(branch.to_string()),
        destination: None,
        enabled: true,
        auto_run: false,
        worktree_setup_commands: Vec::new(),
    })
}

/// Initialize the worktree's state root and run the base's setup
/// commands at the effective destination.
///
/// Any failure leaves an `init_error` marker in the worktree's state
/// root, so the tracked entry reports `INIT_ERROR` until a rerun
/// succeeds.
pub async fn provision_worktree(
    hub_root: &Path,
    entry: &RepoEntry,
    base: &RepoEntry,
) -> Result<(), HubError> {
    let worktree_root = entry.root(hub_root);
    init_repo(&worktree_root)?;
    let state_root = car_core::repo_state_root(&worktree_root);

    let destination = entry.effective_destination(Some(base)).clone();
    for command in &base.worktree_setup_commands {
        let argv = vec!["sh".to_string(), "-c".to_string(), command.clone()];
        let wrapped = match wrap_command(&destination, &argv, &worktree_root) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                let err =
                    HubError::SetupCommand { command: command.clone(), message: e.to_string() };
                crate::init::write_init_error(&state_root, &err.to_string());
                return Err(err);
            }
        };
        let (program, args) = match wrapped.split_first() {
            Some(split) => split,
            None => continue,
        };
        let output = match Command::new(program)
            .args(args)
            .current_dir(&worktree_root)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let err =
                    HubError::SetupCommand { command: command.clone(), message: e.to_string() };
                crate::init::write_init_error(&state_root, &err.to_string());
                return Err(err);
            }
        };
        if !output.status.success() {
            let err = HubError::SetupCommand {
                command: command.clone(),
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            };
            crate::init::write_init_error(&state_root, &err.to_string());
            return Err(err);
        }
    }

    tracing::info!(worktree = %entry.id, base = %base.id, "worktree provisioned");
    Ok(())
}

/// Checkout and provision in one go, for callers that don't track the
/// entry themselves.
pub async fn create_worktree(
    hub_root: &Path,
    base: &RepoEntry,
    branch: &str,
    dir_name: Option<&str>,
) -> Result<RepoEntry, HubError> {
    let entry = create_checkout(hub_root, base, branch, dir_name).await?;
    provision_worktree(hub_root, &entry, base).await?;
    tracing::info!(worktree = %entry.id, branch, base = %base.id, "worktree created");
    Ok(entry)
}

/// Uncommitted changes check.
///
/// The repo state root is runtime state, not user work, so it never
/// counts as dirt; otherwise every initialized worktree would refuse
/// cleanup forever.
pub async fn worktree_is_dirty(worktree_root: &Path) -> Result<bool, HubError> {
    let status = git(&["status", "--porcelain"], worktree_root).await?;
    Ok(status.lines().any(|line| {
        let path = line.get(3..).unwrap_or_default();
        !path.trim_start_matches('"').starts_with(car_core::STATE_DIR_NAME)
    }))
}

/// Remove a worktree.
///
/// Refuses a dirty worktree unless forced. With `force_archive`, the
/// runtime state (flow store, runs, tickets) is moved under the hub's
/// archive directory before the checkout is removed; otherwise the
/// state is deleted with the worktree.
pub async fn cleanup_worktree(
    hub_root: &Path,
    entry: &RepoEntry,
    base_root: &Path,
    force_archive: bool,
) -> Result<(), HubError> {
    let worktree_root = entry.root(hub_root);

    if worktree_root.is_dir() {
        if !force_archive && worktree_is_dirty(&worktree_root).await? {
            return Err(HubError::WorktreeDirty { path: worktree_root });
        }
        if force_archive {
            let state_root = car_core::repo_state_root(&worktree_root);
            if state_root.is_dir() {
                let archive_dir = hub_root
                    .join(car_core::STATE_DIR_NAME)
                    .join("archive")
                    .join(entry.id.as_str());
                if let Some(parent) = archive_dir.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| HubError::Io { path: parent.to_path_buf(), source: e })?;
                }
                std::fs::rename(&state_root, &archive_dir)
                    .map_err(|e| HubError::Io { path: state_root, source: e })?;
            }
        }
        git(
            &["worktree", "remove", "--force", &worktree_root.display().to_string()],
            base_root,
        )
        .await?;
    } else {
        // Directory already gone; prune the stale registration.
        git(&["worktree", "prune"], base_root).await?;
    }

    tracing::info!(worktree = %entry.id, "worktree removed");
    Ok(())
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
