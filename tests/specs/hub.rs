// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub discovery and status aggregation specs.

use super::prelude::TestHub;
use car_core::RepoId;
use car_hub::{HubError, Manifest, RepoStatus};

fn run_git(args: &[&str], cwd: &std::path::Path) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_AUTHOR_NAME", "t")
        .env("GIT_AUTHOR_EMAIL", "t@example.com")
        .env("GIT_COMMITTER_NAME", "t")
        .env("GIT_COMMITTER_EMAIL", "t@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

#[tokio::test]
async fn scan_covers_every_on_disk_repo_and_marks_missing() {
    let t = TestHub::new();
    std::fs::create_dir_all(t.root().join("api/.git")).unwrap();
    std::fs::create_dir_all(t.root().join("web/.git")).unwrap();
    // Not a repo: no .git.
    std::fs::create_dir_all(t.root().join("docs")).unwrap();
    // Tracked but vanished.
    {
        let mut manifest = Manifest::load(t.root()).unwrap();
        manifest.upsert(car_core::RepoEntry::base(RepoId::new("ghost"), "ghost".into()));
        manifest.save(t.root()).unwrap();
    }

    let report = t.hub.scan().unwrap();

    let manifest = Manifest::load(t.root()).unwrap();
    for id in ["api", "web"] {
        assert!(manifest.entry(&RepoId::new(id)).is_some(), "{id} should be tracked");
    }
    assert_eq!(report.missing, vec![RepoId::new("ghost")]);
    assert!(manifest.entry(&RepoId::new("docs")).is_none());

    let snapshots = t.hub.list_repos();
    let ghost = snapshots.iter().find(|s| s.id == RepoId::new("ghost")).unwrap();
    assert_eq!(ghost.status, RepoStatus::Missing);
}

#[tokio::test]
async fn failed_worktree_setup_is_tracked_as_init_error() {
    let t = TestHub::new();
    // Worktree creation shells out to git, so the base must be real.
    let base_root = t.root().join("api");
    std::fs::create_dir_all(&base_root).unwrap();
    run_git(&["init", "-q", "-b", "main"], &base_root);
    std::fs::write(base_root.join("README.md"), "hello\n").unwrap();
    run_git(&["add", "."], &base_root);
    run_git(&["commit", "-q", "-m", "init"], &base_root);
    t.hub.scan().unwrap();

    // Give the base a setup command that always fails.
    {
        let mut manifest = Manifest::load(t.root()).unwrap();
        manifest.entry_mut(&RepoId::new("api")).unwrap().worktree_setup_commands =
            vec!["exit 7".into()];
        manifest.save(t.root()).unwrap();
    }
    t.hub.scan().unwrap();

    let err = t
        .hub
        .worktree_create(&RepoId::new("api"), "broken", Some("api-broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::SetupCommand { .. }));

    // The failed worktree stays tracked and reports INIT_ERROR.
    let manifest = Manifest::load(t.root()).unwrap();
    assert!(manifest.entry(&RepoId::new("api-broken")).is_some());
    let snapshot = t
        .hub
        .list_repos()
        .into_iter()
        .find(|s| s.id == RepoId::new("api-broken"))
        .unwrap();
    assert_eq!(snapshot.status, RepoStatus::InitError);
}

#[tokio::test]
async fn statuses_reflect_flow_state_across_repos() {
    let t = TestHub::new();
    let api = t.seed_repo("api");
    t.seed_repo("web");
    t.write_ticket("api", 1, false);

    // api pauses on handoff; web stays idle.
    t.fake.push_turn(vec![
        car_backend::RunEvent::Started {
            backend_id: "codex".into(),
            thread_id: "thr-1".into(),
            turn_id: "trn-1".into(),
        },
        car_backend::RunEvent::HandoffRequested {
            mode: car_backend::HandoffMode::Pause,
            title: None,
            body: None,
            attachments: vec![],
        },
    ]);
    t.hub.start(&api, false).await.unwrap();
    t.hub.await_idle(&api).await;

    let snapshots = t.hub.list_repos();
    let api_snap = snapshots.iter().find(|s| s.id.as_str() == "api").unwrap();
    let web_snap = snapshots.iter().find(|s| s.id.as_str() == "web").unwrap();
    assert_eq!(api_snap.status, RepoStatus::Paused);
    assert_eq!(web_snap.status, RepoStatus::Idle);
    assert_eq!(api_snap.open_tickets, 1);
}
