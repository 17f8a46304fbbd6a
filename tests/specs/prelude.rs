// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for workspace specs.

use car_backend::fake::FakeBackend;
use car_backend::Orchestrator;
use car_core::{RepoId, Ticket};
use car_hub::{Hub, HubOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A hub over a temp directory with one scripted backend registered
/// under the default agent id.
pub struct TestHub {
    pub dir: tempfile::TempDir,
    pub hub: Hub,
    pub fake: Arc<FakeBackend>,
}

impl TestHub {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeBackend::new("codex");

        let state_dir = dir.path().join(".codex-autorunner");
        std::fs::create_dir_all(&state_dir).unwrap();
        let global = dir.path().join("global-state");
        std::fs::write(
            state_dir.join("config.yml"),
            format!("mode: hub\nversion: 2\nglobal_state_root: {}\n", global.display()),
        )
        .unwrap();

        let mut orchestrator = Orchestrator::new(&global);
        orchestrator.register(fake.clone());
        let hub =
            Hub::open_with(dir.path(), HubOptions { auto_init_missing: true }, orchestrator)
                .unwrap();
        Self { dir, hub, fake }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Lay down a git repo directory and track it via scan.
    pub fn seed_repo(&self, id: &str) -> RepoId {
        std::fs::create_dir_all(self.root().join(id).join(".git")).unwrap();
        self.hub.scan().unwrap();
        RepoId::new(id)
    }

    pub fn state_root(&self, id: &str) -> PathBuf {
        self.root().join(id).join(".codex-autorunner")
    }

    pub fn ticket_path(&self, id: &str, number: u32) -> PathBuf {
        self.state_root(id).join("tickets").join(Ticket::file_name(number))
    }

    pub fn write_ticket(&self, id: &str, number: u32, done: bool) -> PathBuf {
        let path = self.ticket_path(id, number);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("---\nagent: codex\ndone: {done}\n---\nwork item\n"))
            .unwrap();
        path
    }

    /// Script one turn that flips the given ticket to done and reports it.
    pub fn script_completing_turn(&self, id: &str, number: u32) {
        let path = self.ticket_path(id, number);
        let reference = format!("TICKET-{number:03}");
        self.fake.push_turn_with(
            FakeBackend::simple_turn("codex", "thr-1", "ok", &[&reference]),
            move || car_core::set_done(&path, true).unwrap(),
        );
    }

    pub fn event_types(&self, id: &RepoId, run_id: &car_store::RunId) -> Vec<String> {
        self.hub
            .events(id, run_id, None)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}
