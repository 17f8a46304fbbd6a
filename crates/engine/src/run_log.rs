// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run `run.log` artifact: a human-readable mirror of delta text.

use car_store::RunId;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only mirror of a run's streamed output.
pub struct RunLog {
    path: PathBuf,
    file: std::fs::File,
}

impl RunLog {
    /// Directory holding a run's artifacts.
    pub fn run_dir(state_root: &Path, run_id: &RunId) -> PathBuf {
        state_root.join("runs").join(run_id.as_str())
    }

    /// Open (creating if needed) `runs/<run_id>/run.log`.
    pub fn open(state_root: &Path, run_id: &RunId) -> std::io::Result<Self> {
        let dir = Self::run_dir(state_root, run_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("run.log");
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a chunk of delta text verbatim.
    pub fn append(&mut self, text: &str) -> std::io::Result<()> {
        self.file.write_all(text.as_bytes())
    }

    /// Append a marker line (turn boundaries, stop reasons).
    pub fn marker(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.file, "\n--- {line} ---")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
#[path = "run_log_tests.rs"]
mod tests;
