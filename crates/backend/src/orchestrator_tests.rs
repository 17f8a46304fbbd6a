// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::FakeBackend;
use car_core::Destination;
use tempfile::tempdir;

fn workspace(dir: &tempfile::TempDir, repo_id: &str) -> Workspace {
    Workspace {
        key: WorkspaceKey::ticket_flow(repo_id),
        repo_root: dir.path().join(repo_id),
        state_root: dir.path().join(repo_id).join(".codex-autorunner"),
        destination: Destination::Local,
    }
}

fn orchestrator_with(dir: &tempfile::TempDir, fake: &std::sync::Arc<FakeBackend>) -> Orchestrator {
    let mut orch = Orchestrator::new(dir.path());
    orch.register(fake.clone());
    orch
}

#[tokio::test]
async fn unknown_backend_is_an_error() {
    let dir = tempdir().unwrap();
    let orch = Orchestrator::new(dir.path());

    let err = orch.ensure_ready("codex", &workspace(&dir, "api")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownBackend(agent) if agent == "codex"));
}

#[tokio::test]
async fn ensure_ready_reuses_live_handle() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    let orch = orchestrator_with(&dir, &fake);
    let ws = workspace(&dir, "api");

    let a = orch.ensure_ready("codex", &ws).await.unwrap();
    let b = orch.ensure_ready("codex", &ws).await.unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(fake.ensure_ready_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn ensure_ready_retries_transient_failures() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    fake.fail_ensure_ready_times(2);
    let orch = orchestrator_with(&dir, &fake);

    let handle = orch.ensure_ready("codex", &workspace(&dir, "api")).await.unwrap();

    assert_eq!(handle.backend_id, "codex");
    assert_eq!(fake.ensure_ready_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn ensure_ready_exhaustion_is_start_failure() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    fake.fail_ensure_ready_times(10);
    let orch = orchestrator_with(&dir, &fake);

    let err = orch.ensure_ready("codex", &workspace(&dir, "api")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::StartFailure { attempts: 3, .. }));
}

#[tokio::test]
async fn run_turn_streams_events_through() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    fake.push_turn(FakeBackend::simple_turn("codex", "thr-1", "hello", &["TICKET-001"]));
    let orch = orchestrator_with(&dir, &fake);

    let mut stream = orch
        .run_turn("codex", &workspace(&dir, "api"), "do the thing", TurnOptions::default())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], RunEvent::Started { thread_id, .. } if thread_id == "thr-1"));
    assert!(events.last().map(|e| e.is_terminal()).unwrap_or(false));
    assert_eq!(fake.prompts(), vec!["do the thing".to_string()]);
}

#[tokio::test]
async fn thread_continuity_flows_into_next_turn() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    fake.push_turn(FakeBackend::simple_turn("codex", "thr-9", "first", &[]));
    fake.push_turn(FakeBackend::simple_turn("codex", "thr-9", "second", &[]));
    let orch = orchestrator_with(&dir, &fake);
    let ws = workspace(&dir, "api");

    let mut stream = orch.run_turn("codex", &ws, "one", TurnOptions::default()).await.unwrap();
    while stream.next().await.is_some() {}

    // The relay needs a tick to observe Started and persist the thread.
    tokio::task::yield_now().await;
    assert_eq!(orch.stored_thread(&ws.key), Some("thr-9".to_string()));

    let mut stream = orch.run_turn("codex", &ws, "two", TurnOptions::default()).await.unwrap();
    while stream.next().await.is_some() {}

    let seen = fake.seen_threads();
    assert_eq!(seen[0], None);
    assert_eq!(seen[1], Some("thr-9".to_string()));
}

#[tokio::test]
async fn close_releases_every_handle() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    let orch = orchestrator_with(&dir, &fake);

    orch.ensure_ready("codex", &workspace(&dir, "api")).await.unwrap();
    orch.ensure_ready("codex", &workspace(&dir, "web")).await.unwrap();

    orch.close().await;
    assert_eq!(fake.close_calls(), 2);

    // Idempotent.
    orch.close().await;
    assert_eq!(fake.close_calls(), 2);
}

#[tokio::test]
async fn cancelling_outer_stream_cancels_inner_turn() {
    let dir = tempdir().unwrap();
    let fake = FakeBackend::new("codex");
    fake.push_hold_open(vec![RunEvent::Delta { text: "working".into() }]);
    let orch = orchestrator_with(&dir, &fake);

    let mut stream = orch
        .run_turn("codex", &workspace(&dir, "api"), "go", TurnOptions::default())
        .await
        .unwrap();

    assert_eq!(stream.next().await, Some(RunEvent::Delta { text: "working".into() }));
    stream.cancel();

    // The held-open fake turn only ends via cancellation propagation.
    assert_eq!(stream.next().await, None);
}
