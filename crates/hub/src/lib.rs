// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! car-hub: the multi-repo supervisor.
//!
//! Discovers repos under a hub root, keeps the manifest, creates and
//! owns one engine per repo, fans operations out in parallel across
//! repos while serializing them per repo id, and aggregates status.
//! Engines hold a non-owning reference to the orchestrator, which
//! outlives them all; the hub exclusively owns both.

mod config;
mod discovery;
mod error;
mod hub;
mod init;
mod logging;
mod manifest;
mod status;
mod worktree;

pub use config::{
    detect_mode, load_config, require_mode, ConfigError, ConfigFile, Mode, OpencodeConfig,
    CONFIG_VERSION,
};
pub use discovery::{discover_repos, Discovered};
pub use error::HubError;
pub use hub::{Hub, HubOptions, ScanReport, StartInfo};
pub use init::{init_repo, initializing_pid, is_initialized, read_init_error};
pub use logging::{init_hub_tracing, rotate_if_needed, LOG_BACKUPS, LOG_MAX_BYTES};
pub use manifest::{manifest_path, Manifest, MANIFEST_VERSION};
pub use status::{repo_snapshot, RepoSnapshot, RepoStatus};
pub use worktree::{cleanup_worktree, create_checkout, create_worktree, provision_worktree};
