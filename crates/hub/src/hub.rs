// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub supervisor.

use crate::config::{load_config, ConfigFile, Mode};
use crate::discovery::discover_repos;
use crate::error::HubError;
use crate::init::{init_repo, is_initialized};
use crate::manifest::Manifest;
use crate::status::{repo_snapshot, RepoSnapshot, RepoStatus};
use car_backend::codex::CodexBackend;
use car_backend::opencode::OpencodeBackend;
use car_backend::{Orchestrator, ProcessRegistry};
use car_core::{global_state_root, write_atomic, Clock, Destination, RepoEntry, RepoId, SystemClock};
use car_engine::{Engine, EngineConfig, StartOutcome};
use car_store::{FlowEventRecord, RunId};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hub construction options.
#[derive(Debug, Clone, Default)]
pub struct HubOptions {
    /// Initialize newly discovered repos during `scan`.
    pub auto_init_missing: bool,
}

/// Result of `hub.scan`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScanReport {
    pub added: Vec<RepoId>,
    pub missing: Vec<RepoId>,
}

/// Result of `hub.start`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartInfo {
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

type HubEngine = Engine<SystemClock>;

/// Supervisor over every repo under one hub root.
///
/// Exclusively owns the per-repo engines and the orchestrator. At most
/// one hub supervises a directory at a time, enforced by an exclusive
/// hub lock taken at open; secondaries fail fast.
pub struct Hub {
    hub_root: PathBuf,
    options: HubOptions,
    config: ConfigFile,
    manifest: Mutex<Manifest>,
    engines: Mutex<HashMap<RepoId, Arc<HubEngine>>>,
    /// Per-repo serialization: hub operations on one repo queue here
    /// while operations on other repos proceed in parallel.
    repo_gates: Mutex<HashMap<RepoId, Arc<tokio::sync::Mutex<()>>>>,
    run_tasks: Mutex<HashMap<RepoId, tokio::task::JoinHandle<()>>>,
    orchestrator: Arc<Orchestrator>,
    clock: SystemClock,
    // NOTE(lifetime): held to keep the exclusive hub lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub").field("hub_root", &self.hub_root).finish_non_exhaustive()
    }
}

impl Hub {
    /// Open a hub over `hub_root`, taking the hub lock. Backends are the
    /// bundled codex and opencode adapters.
    pub fn open(hub_root: &Path, options: HubOptions) -> Result<Self, HubError> {
        Self::open_inner(hub_root, options, None)
    }

    /// Open with a caller-supplied orchestrator (tests inject scripted
    /// backends this way).
    pub fn open_with(
        hub_root: &Path,
        options: HubOptions,
        orchestrator: Orchestrator,
    ) -> Result<Self, HubError> {
        Self::open_inner(hub_root, options, Some(orchestrator))
    }

    fn open_inner(
        hub_root: &Path,
        options: HubOptions,
        orchestrator: Option<Orchestrator>,
    ) -> Result<Self, HubError> {
        let state_dir = hub_root.join(car_core::STATE_DIR_NAME);
        std::fs::create_dir_all(&state_dir)
            .map_err(|e| HubError::Io { path: state_dir.clone(), source: e })?;

        // Exclusive hub lock first; everything else is safe after it.
        // Open without truncating so a failed try_lock leaves the live
        // supervisor's PID intact.
        let lock_path = state_dir.join("lock");
        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| HubError::Io { path: lock_path.clone(), source: e })?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| HubError::HubLockHeld { path: lock_path.clone() })?;
        lock_file.set_len(0).map_err(|e| HubError::Io { path: lock_path.clone(), source: e })?;
        writeln!(lock_file, "{}", std::process::id())
            .map_err(|e| HubError::Io { path: lock_path, source: e })?;

        let hub_config_path = state_dir.join("config.yml");
        if !hub_config_path.exists() {
            let yaml = serde_yaml::to_string(&ConfigFile::hub_defaults()).map_err(|e| {
                HubError::Config(crate::config::ConfigError::Parse {
                    path: hub_config_path.clone(),
                    message: e.to_string(),
                })
            })?;
            write_atomic(&hub_config_path, yaml.as_bytes())
                .map_err(|e| HubError::Io { path: hub_config_path.clone(), source: e })?;
        }
        let config = load_config(hub_root, ConfigFile::hub_defaults())?;
        if config.mode != Mode::Hub {
            return Err(HubError::Config(crate::config::ConfigError::ModeMismatch {
                expected: Mode::Hub,
                actual: config.mode,
                path: hub_config_path,
            }));
        }

        let global_root = global_state_root(config.global_state_root.as_deref())
            .map_err(crate::config::ConfigError::Path)?;
        std::fs::create_dir_all(&global_root)
            .map_err(|e| HubError::Io { path: global_root.clone(), source: e })?;
        let orchestrator = match orchestrator {
            Some(orchestrator) => orchestrator,
            None => {
                let mut orchestrator = Orchestrator::new(&global_root);
                orchestrator.register(Arc::new(CodexBackend::new()));
                orchestrator.register(Arc::new(OpencodeBackend::new(
                    ProcessRegistry::new(&global_root),
                    config.opencode.server_scope,
                )));
                orchestrator
            }
        };

        let manifest = Manifest::load(hub_root)?;
        Ok(Self {
            hub_root: hub_root.to_path_buf(),
            options,
            config,
            manifest: Mutex::new(manifest),
            engines: Mutex::new(HashMap::new()),
            repo_gates: Mutex::new(HashMap::new()),
            run_tasks: Mutex::new(HashMap::new()),
            orchestrator: Arc::new(orchestrator),
            clock: SystemClock,
            lock_file,
        })
    }

    pub fn hub_root(&self) -> &Path {
        &self.hub_root
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    fn gate(&self, repo_id: &RepoId) -> Arc<tokio::sync::Mutex<()>> {
        self.repo_gates
            .lock()
            .entry(repo_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn entry(&self, repo_id: &RepoId) -> Result<RepoEntry, HubError> {
        self.manifest
            .lock()
            .entry(repo_id)
            .cloned()
            .ok_or_else(|| HubError::UnknownRepo(repo_id.clone()))
    }

    fn effective_destination(&self, entry: &RepoEntry) -> Destination {
        let manifest = self.manifest.lock();
        let base = entry.base_repo_id.as_ref().and_then(|id| manifest.entry(id));
        entry.effective_destination(base).clone()
    }

    /// At most one in-process engine per repo id.
    fn engine_for(&self, repo_id: &RepoId) -> Result<Arc<HubEngine>, HubError> {
        if let Some(engine) = self.engines.lock().get(repo_id) {
            return Ok(engine.clone());
        }
        let entry = self.entry(repo_id)?;
        if !entry.enabled {
            return Err(HubError::RepoDisabled(repo_id.clone()));
        }
        let repo_root = entry.root(&self.hub_root);
        if !repo_root.is_dir() {
            return Err(HubError::RepoMissing(repo_id.clone()));
        }
        // Hub-level engine settings are the defaults the repo's own
        // config layers override.
        let repo_defaults =
            ConfigFile { engine: self.config.engine.clone(), ..ConfigFile::repo_defaults() };
        let engine_config: EngineConfig = load_config(&repo_root, repo_defaults)?.engine;
        let engine = Arc::new(Engine::new(
            repo_id.clone(),
            repo_root,
            self.orchestrator.clone(),
            self.effective_destination(&entry),
            engine_config,
            self.clock.clone(),
        )?);
        self.engines.lock().insert(repo_id.clone(), engine.clone());
        Ok(engine)
    }

    /// Rediscover repos, update the manifest, snapshot hub state.
    ///
    /// New on-disk repos are tracked (`enabled`, not `auto_run`);
    /// manifest entries with no directory are reported `missing` but
    /// never removed.
    pub fn scan(&self) -> Result<ScanReport, HubError> {
        let discovered = discover_repos(&self.hub_root)
            .map_err(|e| HubError::Io { path: self.hub_root.clone(), source: e })?;
        let mut report = ScanReport::default();
        {
            let mut manifest = self.manifest.lock();
            // Humans edit the manifest too; pick up their changes first.
            *manifest = Manifest::load(&self.hub_root)?;
            for found in &discovered {
                if manifest.entry(&found.id).is_none() {
                    manifest.upsert(RepoEntry::base(found.id.clone(), found.path.clone()));
                    report.added.push(found.id.clone());
                }
            }
            for entry in &manifest.repos {
                if !entry.root(&self.hub_root).is_dir() {
                    report.missing.push(entry.id.clone());
                }
            }
            manifest.save(&self.hub_root)?;
        }

        if self.options.auto_init_missing {
            for repo_id in &report.added {
                let entry = self.entry(repo_id)?;
                let root = entry.root(&self.hub_root);
                if !is_initialized(&root) {
                    init_repo(&root)?;
                }
            }
        }

        self.write_hub_state()?;
        tracing::info!(
            added = report.added.len(),
            missing = report.missing.len(),
            "hub scan complete"
        );
        Ok(report)
    }

    /// Status snapshot for every manifest entry.
    pub fn list_repos(&self) -> Vec<RepoSnapshot> {
        let entries: Vec<RepoEntry> = self.manifest.lock().repos.clone();
        entries.iter().map(|entry| repo_snapshot(&self.hub_root, entry)).collect()
    }

    /// Initialize one repo's state root.
    pub async fn init(&self, repo_id: &RepoId) -> Result<(), HubError> {
        let gate = self.gate(repo_id);
        let _guard = gate.lock().await;
        let entry = self.entry(repo_id)?;
        init_repo(&entry.root(&self.hub_root))
    }

    /// Create or reuse the repo's flow run and drive it in the background.
    pub async fn start(&self, repo_id: &RepoId, force_new: bool) -> Result<StartInfo, HubError> {
        let gate = self.gate(repo_id);
        let _guard = gate.lock().await;
        let entry = self.entry(repo_id)?;
        let repo_root = entry.root(&self.hub_root);
        if !is_initialized(&repo_root) {
            init_repo(&repo_root)?;
        }
        let engine = self.engine_for(repo_id)?;
        let outcome = engine.start(force_new)?;
        let run_id = outcome.run().id.clone();
        let hint = outcome.hint();
        if matches!(outcome, StartOutcome::Created(_)) {
            self.spawn_run_loop(repo_id.clone(), engine, run_id.clone());
        }
        Ok(StartInfo { run_id, hint })
    }

    fn spawn_run_loop(&self, repo_id: RepoId, engine: Arc<HubEngine>, run_id: RunId) {
        // No hub gate here: exclusion while running comes from the repo
        // lock file, and holding the gate for a whole flow would block
        // every other hub operation on this repo.
        let task_repo = repo_id.clone();
        let handle = tokio::spawn(async move {
            match engine.run_loop(&run_id).await {
                Ok(outcome) => {
                    tracing::info!(repo = %task_repo, run = %run_id.short(), ?outcome, "run loop finished")
                }
                Err(e) => {
                    tracing::warn!(repo = %task_repo, run = %run_id.short(), error = %e, "run loop error")
                }
            }
        });
        self.run_tasks.lock().insert(repo_id, handle);
    }

    /// Set the stop flag on a run; the engine acknowledges between events.
    pub async fn stop(&self, repo_id: &RepoId, run_id: &RunId) -> Result<(), HubError> {
        let engine = self.engine_for(repo_id)?;
        engine.stop(run_id)?;
        Ok(())
    }

    /// Resume a paused run and drive it in the background.
    ///
    /// This is also the explicit path that reclaims a stale lock; a live
    /// lock still refuses.
    pub async fn resume(&self, repo_id: &RepoId, run_id: &RunId) -> Result<(), HubError> {
        let gate = self.gate(repo_id);
        let _guard = gate.lock().await;
        let engine = self.engine_for(repo_id)?;
        let run = run_id.clone();
        let task_repo = repo_id.clone();
        let handle = tokio::spawn(async move {
            match engine.resume(&run).await {
                Ok(outcome) => {
                    tracing::info!(repo = %task_repo, run = %run.short(), ?outcome, "resume finished")
                }
                Err(e) => {
                    tracing::warn!(repo = %task_repo, run = %run.short(), error = %e, "resume error")
                }
            }
        });
        self.run_tasks.lock().insert(repo_id.clone(), handle);
        Ok(())
    }

    /// Wait for the repo's background run task, if any.
    pub async fn await_idle(&self, repo_id: &RepoId) {
        let handle = self.run_tasks.lock().remove(repo_id);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Ordered events for a run, optionally after a cursor.
    pub fn events(
        &self,
        repo_id: &RepoId,
        run_id: &RunId,
        after_seq: Option<u64>,
    ) -> Result<Vec<FlowEventRecord>, HubError> {
        let engine = self.engine_for(repo_id)?;
        Ok(engine.store().get_events(run_id, after_seq, None))
    }

    /// Create a worktree entry off a base repo.
    ///
    /// The entry is tracked in the manifest as soon as the checkout
    /// exists, before provisioning runs. A failed provision therefore
    /// stays visible: the tracked entry reports `INIT_ERROR` from the
    /// marker the provision step left behind.
    pub async fn worktree_create(
        &self,
        base_id: &RepoId,
        branch: &str,
        dir_name: Option<&str>,
    ) -> Result<RepoEntry, HubError> {
        let gate = self.gate(base_id);
        let _guard = gate.lock().await;
        let base = self.entry(base_id)?;
        let entry = crate::worktree::create_checkout(&self.hub_root, &base, branch, dir_name).await?;
        {
            let mut manifest = self.manifest.lock();
            manifest.upsert(entry.clone());
            manifest.save(&self.hub_root)?;
        }
        crate::worktree::provision_worktree(&self.hub_root, &entry, &base).await?;
        Ok(entry)
    }

    /// Remove a worktree entry and its checkout.
    pub async fn worktree_cleanup(
        &self,
        repo_id: &RepoId,
        force_archive: bool,
    ) -> Result<(), HubError> {
        let gate = self.gate(repo_id);
        let _guard = gate.lock().await;
        let entry = self.entry(repo_id)?;
        let base_root = entry
            .base_repo_id
            .as_ref()
            .and_then(|id| self.manifest.lock().entry(id).cloned())
            .map(|base| base.root(&self.hub_root))
            .ok_or_else(|| HubError::UnknownRepo(repo_id.clone()))?;
        crate::worktree::cleanup_worktree(&self.hub_root, &entry, &base_root, force_archive).await?;
        self.engines.lock().remove(repo_id);
        let mut manifest = self.manifest.lock();
        manifest.remove(repo_id);
        manifest.save(&self.hub_root)?;
        Ok(())
    }

    /// Pin a repo's execution destination in the manifest.
    pub async fn destination_set(
        &self,
        repo_id: &RepoId,
        destination: Option<Destination>,
    ) -> Result<(), HubError> {
        if let Some(dest) = &destination {
            dest.validate()
                .map_err(|e| HubError::Engine(car_engine::EngineError::Config(e.to_string())))?;
        }
        let gate = self.gate(repo_id);
        let _guard = gate.lock().await;
        {
            let mut manifest = self.manifest.lock();
            let entry = manifest
                .entry_mut(repo_id)
                .ok_or_else(|| HubError::UnknownRepo(repo_id.clone()))?;
            entry.destination = destination;
            manifest.save(&self.hub_root)?;
        }
        // Destination changes take effect on the next engine build.
        self.engines.lock().remove(repo_id);
        Ok(())
    }

    /// Write the `hub_state.json` snapshot (last scan + statuses).
    fn write_hub_state(&self) -> Result<(), HubError> {
        let snapshot = serde_json::json!({
            "last_scan": self.clock.timestamp(),
            "repos": self.list_repos(),
        });
        let path = self.hub_root.join(car_core::STATE_DIR_NAME).join("hub_state.json");
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .unwrap_or_else(|_| b"{}".to_vec());
        write_atomic(&path, &bytes).map_err(|e| HubError::Io { path, source: e })
    }

    /// Count of repos currently reported as running.
    pub fn running_count(&self) -> usize {
        self.list_repos().iter().filter(|s| s.status == RepoStatus::Running).count()
    }

    /// Shut the hub down: close every backend attachment and release
    /// the hub lock (on drop). Idempotent.
    pub async fn close(&self) {
        let tasks: Vec<_> = self.run_tasks.lock().drain().collect();
        for (_, handle) in tasks {
            let _ = handle.await;
        }
        self.orchestrator.close().await;
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
