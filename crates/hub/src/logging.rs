// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log file rotation and tracing wiring.
//!
//! Rotation is size-based with numbered backups, applied before a log
//! file is opened for appending: `x.log` → `x.log.1` → … → `x.log.3`,
//! oldest falling off. Rotation failures degrade to plain appending;
//! losing a rotation beats losing the process.

use std::path::{Path, PathBuf};

/// Rotate when the live file reaches this size.
pub const LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// How many numbered backups to keep.
pub const LOG_BACKUPS: u32 = 3;

fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Shift backups and move the live file aside if it is at/over the cap.
pub fn rotate_if_needed(path: &Path) -> std::io::Result<()> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < LOG_MAX_BYTES {
        return Ok(());
    }
    // Oldest backup falls off the end.
    let _ = std::fs::remove_file(backup_path(path, LOG_BACKUPS));
    for index in (1..LOG_BACKUPS).rev() {
        let _ = std::fs::rename(backup_path(path, index), backup_path(path, index + 1));
    }
    std::fs::rename(path, backup_path(path, 1))
}

/// Route tracing output to the hub log file.
///
/// Returns the appender guard; dropping it flushes buffered lines.
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_hub_tracing(log_path: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Err(e) = rotate_if_needed(log_path) {
        tracing::warn!(path = %log_path.display(), error = %e, "log rotation failed");
    }
    let dir = log_path.parent()?;
    let file_name = log_path.file_name()?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .finish();
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
