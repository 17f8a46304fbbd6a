// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The on-disk record log backing the Flow Store.
//!
//! One JSON record per line. Run rows are written whole on every change
//! (last write wins at replay); events and artifacts are append-only
//! facts. A torn final line (the one failure mode of a crash mid-append)
//! is truncated away at open; corruption anywhere else is an error.

use crate::types::{FlowArtifact, FlowEventRecord, FlowRun};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One record on the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    /// Full run row; replay keeps the latest write per run id.
    Run { run: FlowRun },
    /// Immutable event fact.
    Event { event: FlowEventRecord },
    /// Immutable artifact fact.
    Artifact { artifact: FlowArtifact },
}

/// Log I/O errors
#[derive(Debug, Error)]
pub enum LogError {
    #[error("flow store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("flow store corrupt at {path}:{line}: {message}")]
    Corrupt { path: PathBuf, line: usize, message: String },
}

/// Append-only log file handle. One writer per process.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Open (creating if needed) and replay the log.
    ///
    /// A partial final line is treated as a torn write: the file is
    /// truncated back to the last complete record and a warning logged.
    /// A malformed record anywhere earlier is corruption and refuses to
    /// open; better to stop than silently drop history.
    pub fn open(path: &Path) -> Result<(Self, Vec<Record>), LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;

        let mut records = Vec::new();
        let mut reader = BufReader::new(
            file.try_clone().map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?,
        );
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;

        let mut offset: u64 = 0;
        let mut line_no: usize = 0;
        let mut buf = String::new();
        loop {
            buf.clear();
            let read = reader
                .read_line(&mut buf)
                .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;
            if read == 0 {
                break;
            }
            line_no += 1;
            if !buf.ends_with('\n') {
                // Torn tail from a crash mid-append. Drop it.
                tracing::warn!(
                    path = %path.display(),
                    line = line_no,
                    "truncating torn tail record in flow store"
                );
                file.set_len(offset)
                    .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;
                break;
            }
            match serde_json::from_str::<Record>(buf.trim_end()) {
                Ok(record) => {
                    offset += read as u64;
                    records.push(record);
                }
                Err(e) => {
                    return Err(LogError::Corrupt {
                        path: path.to_path_buf(),
                        line: line_no,
                        message: e.to_string(),
                    });
                }
            }
        }

        file.seek(SeekFrom::End(0))
            .map_err(|e| LogError::Io { path: path.to_path_buf(), source: e })?;
        Ok((Self { path: path.to_path_buf(), file }, records))
    }

    /// Append one record and flush it to the OS.
    pub fn append(&mut self, record: &Record) -> Result<(), LogError> {
        let mut line = serde_json::to_string(record).map_err(|e| LogError::Corrupt {
            path: self.path.clone(),
            line: 0,
            message: e.to_string(),
        })?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| LogError::Io { path: self.path.clone(), source: e })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
