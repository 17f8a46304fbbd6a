// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy path and pause/resume specs.

use super::prelude::TestHub;
use car_engine::{inspect_lock, LockStatus};
use car_store::RunStatus;

#[tokio::test]
async fn happy_path_single_ticket() {
    let t = TestHub::new();
    let repo = t.seed_repo("api");
    t.write_ticket("api", 1, false);
    t.script_completing_turn("api", 1);

    let info = t.hub.start(&repo, false).await.unwrap();
    t.hub.await_idle(&repo).await;

    assert_eq!(
        t.event_types(&repo, &info.run_id),
        vec![
            "flow_started",
            "step_started",
            "agent_started",
            "agent_stream_delta",
            "ticket_done",
            "flow_completed",
        ]
    );

    // Ticket frontmatter flipped on disk; lock released.
    assert!(car_core::parse_ticket(&t.ticket_path("api", 1)).unwrap().front.done);
    assert_eq!(inspect_lock(&t.state_root("api")), LockStatus::Unlocked);

    // The run.log artifact mirrors the streamed text.
    let store = car_store::FlowStore::open(&t.state_root("api").join("flows.db")).unwrap();
    let run = store.get_run(&info.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    let artifacts = store.get_artifacts(&info.run_id);
    assert!(artifacts.iter().any(|a| a.kind == "run_log" && a.path.exists()));
}

#[tokio::test]
async fn empty_ticket_directory_completes_immediately() {
    let t = TestHub::new();
    let repo = t.seed_repo("api");

    let info = t.hub.start(&repo, false).await.unwrap();
    t.hub.await_idle(&repo).await;

    assert_eq!(t.event_types(&repo, &info.run_id), vec!["flow_started", "flow_completed"]);
}

#[tokio::test]
async fn pause_handoff_then_resume() {
    let t = TestHub::new();
    let repo = t.seed_repo("api");
    t.write_ticket("api", 1, false);
    t.fake.push_turn(vec![
        car_backend::RunEvent::Started {
            backend_id: "codex".into(),
            thread_id: "thr-1".into(),
            turn_id: "trn-1".into(),
        },
        car_backend::RunEvent::HandoffRequested {
            mode: car_backend::HandoffMode::Pause,
            title: Some("approval".into()),
            body: Some("need approval".into()),
            attachments: vec![],
        },
    ]);

    let info = t.hub.start(&repo, false).await.unwrap();
    t.hub.await_idle(&repo).await;

    let store = car_store::FlowStore::open(&t.state_root("api").join("flows.db")).unwrap();
    assert_eq!(store.get_run(&info.run_id).unwrap().status, RunStatus::Paused);
    assert!(t.event_types(&repo, &info.run_id).contains(&"handoff_requested".to_string()));
    assert_eq!(inspect_lock(&t.state_root("api")), LockStatus::Unlocked);

    // Resume with the same run id: a new step runs and finishes the work.
    t.script_completing_turn("api", 1);
    t.hub.resume(&repo, &info.run_id).await.unwrap();
    t.hub.await_idle(&repo).await;

    let store = car_store::FlowStore::open(&t.state_root("api").join("flows.db")).unwrap();
    assert_eq!(store.get_run(&info.run_id).unwrap().status, RunStatus::Completed);
    let steps = t
        .event_types(&repo, &info.run_id)
        .iter()
        .filter(|e| e.as_str() == "step_started")
        .count();
    assert_eq!(steps, 2);
}
