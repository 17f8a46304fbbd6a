// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination wrapping: rewrite a backend command for its execution target.
//!
//! `local` passes argv through untouched. `docker` validates the
//! destination shape first (a bad mount or missing image must fail
//! before anything is spawned), then prefixes a `docker exec` against
//! the destination's container.

use car_core::{Destination, DestinationError};
use std::path::Path;

/// Container name for a repo when the destination doesn't pin one.
pub fn default_container_name(repo_root: &Path) -> String {
    let base = repo_root.file_name().and_then(|n| n.to_str()).unwrap_or("repo");
    format!("car-{base}")
}

/// Rewrite `argv` to execute at the destination.
pub fn wrap_command(
    destination: &Destination,
    argv: &[String],
    repo_root: &Path,
) -> Result<Vec<String>, DestinationError> {
    destination.validate()?;
    match destination {
        Destination::Local => Ok(argv.to_vec()),
        Destination::Docker { container_name, workdir, env_passthrough, env, .. } => {
            let mut cmd = vec!["docker".to_string(), "exec".to_string(), "-i".to_string()];
            if let Some(workdir) = workdir {
                cmd.push("-w".to_string());
                cmd.push(workdir.display().to_string());
            }
            for key in env_passthrough {
                cmd.push("-e".to_string());
                cmd.push(key.clone());
            }
            for (key, value) in env {
                cmd.push("-e".to_string());
                cmd.push(format!("{key}={value}"));
            }
            cmd.push(
                container_name.clone().unwrap_or_else(|| default_container_name(repo_root)),
            );
            cmd.extend(argv.iter().cloned());
            Ok(cmd)
        }
    }
}

/// Argv for creating the destination container itself.
///
/// The repo root is always bind-mounted read-write: it is the only
/// writable path the backend gets inside the container.
pub fn container_run_args(
    destination: &Destination,
    repo_root: &Path,
) -> Result<Vec<String>, DestinationError> {
    destination.validate()?;
    let Destination::Docker { image, container_name, mounts, .. } = destination else {
        return Err(DestinationError::MissingImage);
    };
    let mut cmd = vec![
        "docker".to_string(),
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        container_name.clone().unwrap_or_else(|| default_container_name(repo_root)),
        "-v".to_string(),
        format!("{}:{}", repo_root.display(), repo_root.display()),
    ];
    for mount in mounts {
        let suffix = if mount.read_only { ":ro" } else { "" };
        cmd.push("-v".to_string());
        cmd.push(format!("{}:{}{}", mount.source.display(), mount.target.display(), suffix));
    }
    cmd.push(image.clone());
    // Keep the container alive for subsequent execs.
    cmd.push("sleep".to_string());
    cmd.push("infinity".to_string());
    Ok(cmd)
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;
