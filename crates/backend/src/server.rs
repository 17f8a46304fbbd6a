// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared stdio supervisor plumbing for JSONL backends.
//!
//! Both bundled adapters speak the same transport: a long-lived child
//! process that takes one JSON request per line on stdin and streams
//! JSON events one per line on stdout. Adapters differ only in argv and
//! in how they map wire events onto [`crate::RunEvent`]s.

use crate::backend::{BackendError, Workspace};
use crate::destination::wrap_command;
use crate::registry::{ProcessRegistry, TERMINATE_GRACE};
use car_core::ManagedProcessRecord;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// One spawned JSONL supervisor process.
///
/// Keeps the registry its record was written to, so teardown always
/// removes the record from the right root.
pub(crate) struct JsonlServer {
    pub record: ManagedProcessRecord,
    registry: ProcessRegistry,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl JsonlServer {
    /// Spawn the supervisor at the workspace's destination and record it.
    ///
    /// The record is written before the server is handed out: a crash
    /// between spawn and first use must still leave a reapable trail.
    pub(crate) async fn spawn(
        kind: &str,
        workspace: &Workspace,
        argv: &[String],
        registry: ProcessRegistry,
        started_at: String,
    ) -> Result<Self, BackendError> {
        let wrapped = wrap_command(&workspace.destination, argv, &workspace.repo_root)?;
        let (program, args) = wrapped.split_first().ok_or_else(|| BackendError::Protocol {
            message: "empty backend command".into(),
        })?;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&workspace.repo_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::Spawn { command: wrapped.join(" "), source: e })?;

        let pid = child.id().map(|p| p as i32).unwrap_or(-1);
        let stdin = child.stdin.take().ok_or_else(|| BackendError::Protocol {
            message: "backend child has no stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BackendError::Protocol {
            message: "backend child has no stdout".into(),
        })?;

        let record = ManagedProcessRecord {
            kind: kind.to_string(),
            workspace_id: Some(workspace.key.file_safe()),
            pid,
            pgid: None,
            base_url: None,
            command: wrapped,
            owner_pid: std::process::id() as i32,
            started_at,
            metadata: serde_json::Value::Null,
        };
        registry.record(&record)?;

        Ok(Self { record, registry, child, stdin, stdout: BufReader::new(stdout).lines() })
    }

    pub(crate) fn pid(&self) -> i32 {
        self.record.pid
    }

    /// Liveness via `try_wait`, not the process table: a dead child we
    /// have not reaped yet would still show up there as a zombie.
    pub(crate) fn alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(_) => car_core::pid_alive(self.record.pid),
        }
    }

    /// Send one request line.
    pub(crate) async fn request(&mut self, request: &serde_json::Value) -> Result<(), BackendError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| BackendError::Protocol { message: e.to_string() })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Next stdout line; `None` on EOF (the child died or closed stdout).
    pub(crate) async fn next_line(&mut self) -> Result<Option<String>, BackendError> {
        Ok(self.stdout.next_line().await?)
    }

    /// Terminate the child and drop its record once reaped.
    ///
    /// Our own children must be waited here, not probed via the process
    /// table, where an unreaped child stays visible as a zombie and would
    /// look alive to [`ProcessRegistry::terminate`] forever.
    pub(crate) async fn kill_in_place(&mut self) {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(self.record.pid),
            nix::sys::signal::Signal::SIGTERM,
        );
        if tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await.is_err() {
            tracing::warn!(pid = self.record.pid, kind = %self.record.kind, "grace expired; killing");
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
        if let Err(e) = self.record.remove(self.registry.root()) {
            tracing::warn!(pid = self.record.pid, error = %e, "process record cleanup failed");
        }
    }
}
