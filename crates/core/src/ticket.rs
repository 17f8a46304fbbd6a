// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket files: the unit of work.
//!
//! A ticket is a markdown file `TICKET-NNN.md` with YAML frontmatter.
//! The zero-padded index implies ordering; the frontmatter `done` flag on
//! disk is the sole authority on completion. Tickets are read and written
//! by humans and agents alike, so parsing is tolerant of extra keys and
//! updates preserve everything except the field being changed.

use crate::fsutil::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File-name prefix for ticket files.
pub const TICKET_PREFIX: &str = "TICKET-";

/// Default agent when the frontmatter does not name one.
pub const DEFAULT_AGENT: &str = "codex";

fn default_agent() -> String {
    DEFAULT_AGENT.to_string()
}

/// Typed view of a ticket's YAML frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketFront {
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Default for TicketFront {
    fn default() -> Self {
        Self { agent: default_agent(), done: false, title: None }
    }
}

/// A parsed ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub path: PathBuf,
    pub number: u32,
    pub front: TicketFront,
    pub body: String,
}

impl Ticket {
    /// Canonical file name for a ticket number, e.g. `TICKET-007.md`.
    pub fn file_name(number: u32) -> String {
        format!("{}{:03}.md", TICKET_PREFIX, number)
    }

    /// Stable reference used in prompts and events, e.g. `TICKET-007`.
    pub fn reference(&self) -> String {
        format!("{}{:03}", TICKET_PREFIX, self.number)
    }
}

/// Ticket parsing and update errors.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: ticket file name is not TICKET-NNN.md")]
    BadName { path: PathBuf },

    #[error("{path}: missing YAML frontmatter")]
    MissingFrontmatter { path: PathBuf },

    #[error("{path}:{line}: invalid frontmatter: {message}")]
    Frontmatter { path: PathBuf, line: usize, message: String },
}

impl TicketError {
    /// Path of the offending file.
    pub fn path(&self) -> &Path {
        match self {
            TicketError::Io { path, .. }
            | TicketError::BadName { path }
            | TicketError::MissingFrontmatter { path }
            | TicketError::Frontmatter { path, .. } => path,
        }
    }
}

/// Parse a ticket number from a file name like `TICKET-012.md`.
pub fn ticket_number(file_name: &str) -> Option<u32> {
    let digits = file_name.strip_prefix(TICKET_PREFIX)?.strip_suffix(".md")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List ticket files under `dir`, ordered by ticket number.
///
/// Non-ticket files are ignored. A missing directory lists as empty;
/// an uninitialized repo simply has no work.
pub fn list_ticket_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>, TicketError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(TicketError::Io { path: dir.to_path_buf(), source: e }),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TicketError::Io { path: dir.to_path_buf(), source: e })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(number) = ticket_number(name) {
            files.push((number, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Split markdown content into (frontmatter YAML, body, body line offset).
fn split_frontmatter(path: &Path, content: &str) -> Result<(String, String, usize), TicketError> {
    let Some(rest) = content.strip_prefix("---\n").or_else(|| content.strip_prefix("---\r\n"))
    else {
        return Err(TicketError::MissingFrontmatter { path: path.to_path_buf() });
    };
    for marker in ["\n---\n", "\n---\r\n"] {
        if let Some(end) = rest.find(marker) {
            let yaml = &rest[..end + 1];
            let body = &rest[end + marker.len()..];
            return Ok((yaml.to_string(), body.to_string(), yaml.lines().count() + 2));
        }
    }
    // Frontmatter may close at end-of-file with no trailing newline.
    if let Some(yaml) = rest.strip_suffix("\n---") {
        return Ok((format!("{yaml}\n"), String::new(), 0));
    }
    Err(TicketError::MissingFrontmatter { path: path.to_path_buf() })
}

/// Parse a ticket file from disk.
pub fn parse_ticket(path: &Path) -> Result<Ticket, TicketError> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let number = ticket_number(name).ok_or_else(|| TicketError::BadName { path: path.to_path_buf() })?;
    let content =
        std::fs::read_to_string(path).map_err(|e| TicketError::Io { path: path.to_path_buf(), source: e })?;
    let (yaml, body, _) = split_frontmatter(path, &content)?;
    let front: TicketFront = serde_yaml::from_str(&yaml).map_err(|e| TicketError::Frontmatter {
        path: path.to_path_buf(),
        // +1: the opening `---` occupies line 1 of the file
        line: e.location().map(|l| l.line() + 1).unwrap_or(2),
        message: e.to_string(),
    })?;
    Ok(Ticket { path: path.to_path_buf(), number, front, body })
}

/// Rewrite a ticket's frontmatter `done` flag in place.
///
/// Preserves every other frontmatter key and the body byte-for-byte.
/// The write is atomic so a concurrent reader never sees a torn file.
pub fn set_done(path: &Path, done: bool) -> Result<(), TicketError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| TicketError::Io { path: path.to_path_buf(), source: e })?;
    let (yaml, body, _) = split_frontmatter(path, &content)?;
    let mut mapping: serde_yaml::Mapping =
        serde_yaml::from_str(&yaml).map_err(|e| TicketError::Frontmatter {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line() + 1).unwrap_or(2),
            message: e.to_string(),
        })?;
    mapping.insert(serde_yaml::Value::from("done"), serde_yaml::Value::from(done));
    let new_yaml = serde_yaml::to_string(&mapping).map_err(|e| TicketError::Frontmatter {
        path: path.to_path_buf(),
        line: 2,
        message: e.to_string(),
    })?;
    let rewritten = format!("---\n{new_yaml}---\n{body}");
    write_atomic(path, rewritten.as_bytes())
        .map_err(|e| TicketError::Io { path: path.to_path_buf(), source: e })
}

/// Count `(checked, total)` checkbox items in a markdown body.
pub fn checklist_progress(body: &str) -> (usize, usize) {
    let mut checked = 0;
    let mut total = 0;
    for line in body.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) else {
            continue;
        };
        if rest.starts_with("[ ]") {
            total += 1;
        } else if rest.starts_with("[x]") || rest.starts_with("[X]") {
            total += 1;
            checked += 1;
        }
    }
    (checked, total)
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
