// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution destinations for backend subprocesses.
//!
//! A destination decides how a backend command actually runs: `local`
//! passes the command through untouched; `docker` wraps it in a
//! `docker exec` against a named container with the repo bind-mounted.
//! Worktree entries inherit the base repo's destination unless they
//! carry their own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// A bind mount into a docker destination container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub source: PathBuf,
    pub target: PathBuf,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

/// Where a backend subprocess executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Destination {
    /// Run directly on the host with the invoking user's authority.
    Local,
    /// Run inside a docker container via `docker exec`.
    Docker {
        image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        env_passthrough: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        mounts: Vec<Mount>,
    },
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Local
    }
}

crate::simple_display! {
    Destination {
        Local => "local",
        Docker { .. } => "docker",
    }
}

/// Destination validation errors, raised before any subprocess spawn.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("docker destination requires an image")]
    MissingImage,

    #[error("mount {index}: {field} must not be empty")]
    EmptyMountField { index: usize, field: &'static str },

    #[error("mount {index}: target {target} must be an absolute path")]
    RelativeMountTarget { index: usize, target: PathBuf },
}

impl Destination {
    pub fn is_docker(&self) -> bool {
        matches!(self, Destination::Docker { .. })
    }

    /// Validate shape ahead of spawning. Local destinations are always valid.
    pub fn validate(&self) -> Result<(), DestinationError> {
        let Destination::Docker { image, mounts, .. } = self else {
            return Ok(());
        };
        if image.trim().is_empty() {
            return Err(DestinationError::MissingImage);
        }
        for (index, mount) in mounts.iter().enumerate() {
            if mount.source.as_os_str().is_empty() {
                return Err(DestinationError::EmptyMountField { index, field: "source" });
            }
            if mount.target.as_os_str().is_empty() {
                return Err(DestinationError::EmptyMountField { index, field: "target" });
            }
            if !mount.target.is_absolute() {
                return Err(DestinationError::RelativeMountTarget {
                    index,
                    target: mount.target.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;
