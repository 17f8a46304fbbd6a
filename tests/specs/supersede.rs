// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Force-new supersede spec.

use super::prelude::TestHub;
use car_store::{RunFilter, RunStatus};

#[tokio::test]
async fn force_new_supersedes_a_paused_run() {
    let t = TestHub::new();
    let repo = t.seed_repo("api");
    t.write_ticket("api", 1, false);

    // First run pauses on a handoff.
    t.fake.push_turn(vec![
        car_backend::RunEvent::Started {
            backend_id: "codex".into(),
            thread_id: "thr-1".into(),
            turn_id: "trn-1".into(),
        },
        car_backend::RunEvent::HandoffRequested {
            mode: car_backend::HandoffMode::Pause,
            title: None,
            body: Some("waiting on a human".into()),
            attachments: vec![],
        },
    ]);
    let first = t.hub.start(&repo, false).await.unwrap();
    t.hub.await_idle(&repo).await;

    // Second start with force_new supersedes it and runs to completion.
    t.script_completing_turn("api", 1);
    let second = t.hub.start(&repo, true).await.unwrap();
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(second.hint, None);
    t.hub.await_idle(&repo).await;

    let store = car_store::FlowStore::open(&t.state_root("api").join("flows.db")).unwrap();

    let old = store.get_run(&first.run_id).unwrap();
    assert_eq!(old.status, RunStatus::Superseded);
    let frozen_finished_at = old.finished_at.clone();
    assert!(frozen_finished_at.is_some());

    // The superseded run is terminal and frozen.
    assert!(store
        .set_run_status(&first.run_id, RunStatus::Running, None, None, "2026-01-06T00:00:00.000Z")
        .is_err());

    let new = store.get_run(&second.run_id).unwrap();
    assert_eq!(new.status, RunStatus::Completed);

    // Both runs are visible in history as distinct ids.
    let runs = store.list_runs(&RunFilter::default());
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().any(|r| r.id == first.run_id));
    assert!(runs.iter().any(|r| r.id == second.run_id));
}
