// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use car_backend::fake::FakeBackend;
use car_core::Ticket;
use tempfile::tempdir;

fn seed_hub_config(hub_root: &Path) {
    let state_dir = hub_root.join(car_core::STATE_DIR_NAME);
    std::fs::create_dir_all(&state_dir).unwrap();
    let global = hub_root.join("global-state");
    std::fs::write(
        state_dir.join("config.yml"),
        format!("mode: hub\nversion: 2\nglobal_state_root: {}\n", global.display()),
    )
    .unwrap();
}

fn seed_repo(hub_root: &Path, id: &str) {
    std::fs::create_dir_all(hub_root.join(id).join(".git")).unwrap();
}

fn write_ticket(hub_root: &Path, repo: &str, number: u32, done: bool) -> std::path::PathBuf {
    let tickets = hub_root.join(repo).join(".codex-autorunner/tickets");
    std::fs::create_dir_all(&tickets).unwrap();
    let path = tickets.join(Ticket::file_name(number));
    std::fs::write(&path, format!("---\nagent: codex\ndone: {done}\n---\nwork\n")).unwrap();
    path
}

fn open_hub(hub_root: &Path, fake: &std::sync::Arc<FakeBackend>) -> Hub {
    seed_hub_config(hub_root);
    let mut orchestrator = Orchestrator::new(&hub_root.join("global-state"));
    orchestrator.register(fake.clone());
    Hub::open_with(hub_root, HubOptions { auto_init_missing: true }, orchestrator).unwrap()
}

#[tokio::test]
async fn second_hub_on_same_root_fails_fast() {
    let dir = tempdir().unwrap();
    seed_hub_config(dir.path());
    let _hub = Hub::open(dir.path(), HubOptions::default()).unwrap();

    let err = Hub::open(dir.path(), HubOptions::default()).unwrap_err();
    assert!(matches!(err, HubError::HubLockHeld { .. }));
}

#[tokio::test]
async fn scan_tracks_new_repos_and_marks_missing() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    seed_repo(dir.path(), "web");
    let hub = open_hub(dir.path(), &fake);

    // Pre-track a repo whose directory is gone.
    {
        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.upsert(car_core::RepoEntry::base(RepoId::new("ghost"), "ghost".into()));
        manifest.save(dir.path()).unwrap();
    }

    let report = hub.scan().unwrap();

    let added: Vec<&str> = report.added.iter().map(|id| id.as_str()).collect();
    assert_eq!(added, vec!["api", "web"]);
    assert_eq!(report.missing, vec![RepoId::new("ghost")]);

    // Missing entries survive in the manifest.
    let manifest = Manifest::load(dir.path()).unwrap();
    assert!(manifest.entry(&RepoId::new("ghost")).is_some());

    // auto_init_missing seeded the new repos.
    assert!(is_initialized(&dir.path().join("api")));

    // hub_state.json snapshot reflects the scan.
    let state: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join(".codex-autorunner/hub_state.json")).unwrap(),
    )
    .unwrap();
    assert!(state["last_scan"].is_string());
    assert_eq!(state["repos"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn scan_is_idempotent() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);

    assert_eq!(hub.scan().unwrap().added.len(), 1);
    assert_eq!(hub.scan().unwrap().added.len(), 0);
}

#[tokio::test]
async fn start_drives_the_flow_to_completion() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    let ticket = write_ticket(dir.path(), "api", 1, false);
    fake.push_turn_with(
        FakeBackend::simple_turn("codex", "thr-1", "ok", &["TICKET-001"]),
        move || car_core::set_done(&ticket, true).unwrap(),
    );

    let repo = RepoId::new("api");
    let info = hub.start(&repo, false).await.unwrap();
    assert_eq!(info.hint, None);
    hub.await_idle(&repo).await;

    let events = hub.events(&repo, &info.run_id, None).unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"flow_started"));
    assert!(types.contains(&"ticket_done"));
    assert!(types.contains(&"flow_completed"));

    let snapshot = hub
        .list_repos()
        .into_iter()
        .find(|s| s.id == repo)
        .unwrap();
    assert_eq!(snapshot.status, RepoStatus::Idle);
    assert_eq!(snapshot.done_tickets, 1);
}

#[tokio::test]
async fn second_start_returns_reuse_hint() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    // Hold the flow open so the first run stays active.
    fake.push_hold_open(vec![car_backend::RunEvent::Delta { text: "busy".into() }]);
    write_ticket(dir.path(), "api", 1, false);

    let repo = RepoId::new("api");
    let first = hub.start(&repo, false).await.unwrap();
    let second = hub.start(&repo, false).await.unwrap();

    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.hint, Some("active_run_reused"));

    // Let the held turn end so the background task finishes.
    let engine_stop = hub.stop(&repo, &first.run_id).await;
    assert!(engine_stop.is_ok());
    hub.await_idle(&repo).await;
}

#[tokio::test]
async fn stop_flag_halts_a_running_flow() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    write_ticket(dir.path(), "api", 1, false);
    fake.push_hold_open(vec![car_backend::RunEvent::Delta { text: "busy".into() }]);

    let repo = RepoId::new("api");
    let info = hub.start(&repo, false).await.unwrap();
    hub.stop(&repo, &info.run_id).await.unwrap();
    hub.await_idle(&repo).await;

    let run = hub
        .events(&repo, &info.run_id, None)
        .unwrap();
    assert!(run.iter().any(|e| e.event_type == "flow_stopped"));
}

#[tokio::test]
async fn parallel_starts_across_repos_complete_independently() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    seed_repo(dir.path(), "web");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    let tickets: Vec<_> =
        ["api", "web"].iter().map(|repo| write_ticket(dir.path(), repo, 1, false)).collect();
    // Turn order across repos is nondeterministic, so each scripted turn
    // finishes every open ticket; the slower repo just completes with
    // zero remaining work.
    for _ in 0..2 {
        let tickets = tickets.clone();
        fake.push_turn_with(FakeBackend::simple_turn("codex", "thr", "ok", &[]), move || {
            for ticket in &tickets {
                car_core::set_done(ticket, true).unwrap();
            }
        });
    }

    let api = RepoId::new("api");
    let web = RepoId::new("web");
    let (a, b) = tokio::join!(hub.start(&api, false), hub.start(&web, false));
    a.unwrap();
    b.unwrap();
    hub.await_idle(&api).await;
    hub.await_idle(&web).await;

    for snapshot in hub.list_repos() {
        assert_eq!(snapshot.status, RepoStatus::Idle);
        assert_eq!(snapshot.done_tickets, 1);
    }
}

#[tokio::test]
async fn unknown_repo_is_an_error() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    let hub = open_hub(dir.path(), &fake);

    let err = hub.start(&RepoId::new("nope"), false).await.unwrap_err();
    assert!(matches!(err, HubError::UnknownRepo(_)));
}

#[tokio::test]
async fn destination_set_validates_and_persists() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    let repo = RepoId::new("api");

    let bad = Destination::Docker {
        image: "".into(),
        container_name: None,
        workdir: None,
        profile: None,
        env_passthrough: vec![],
        env: Default::default(),
        mounts: vec![],
    };
    assert!(hub.destination_set(&repo, Some(bad)).await.is_err());

    let good = Destination::Docker {
        image: "ghcr.io/acme/runner:1".into(),
        container_name: None,
        workdir: None,
        profile: None,
        env_passthrough: vec![],
        env: Default::default(),
        mounts: vec![],
    };
    hub.destination_set(&repo, Some(good.clone())).await.unwrap();

    let manifest = Manifest::load(dir.path()).unwrap();
    assert_eq!(manifest.entry(&repo).unwrap().destination, Some(good));
}

#[tokio::test]
async fn disabled_repo_refuses_start() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    seed_repo(dir.path(), "api");
    let hub = open_hub(dir.path(), &fake);
    hub.scan().unwrap();
    {
        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.entry_mut(&RepoId::new("api")).unwrap().enabled = false;
        manifest.save(dir.path()).unwrap();
    }
    // Reopen so the hub sees the edited manifest.
    drop(hub);
    let hub = open_hub(dir.path(), &fake);

    let err = hub.start(&RepoId::new("api"), false).await.unwrap_err();
    assert!(matches!(err, HubError::RepoDisabled(_)));
}
