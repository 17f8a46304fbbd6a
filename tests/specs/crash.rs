// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend crash-mid-stream spec.

use super::prelude::TestHub;
use car_backend::ProcessRegistry;
use car_store::RunStatus;

#[tokio::test]
async fn stream_ending_without_terminal_event_fails_the_flow() {
    let t = TestHub::new();
    let repo = t.seed_repo("api");
    t.write_ticket("api", 1, false);
    let registry = ProcessRegistry::new(&t.root().join("global-state"));
    let baseline = registry.live_count();

    // One delta, then the stream just ends.
    t.fake.push_turn(vec![
        car_backend::RunEvent::Started {
            backend_id: "codex".into(),
            thread_id: "thr-1".into(),
            turn_id: "trn-1".into(),
        },
        car_backend::RunEvent::Delta { text: "partial work".into() },
    ]);

    let info = t.hub.start(&repo, false).await.unwrap();
    t.hub.await_idle(&repo).await;

    let store = car_store::FlowStore::open(&t.state_root("api").join("flows.db")).unwrap();
    let run = store.get_run(&info.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or_default().contains("turn_crash"));

    let failed = store.get_events(&info.run_id, None, Some(&["flow_failed"]));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["kind"], "turn_crash");
    assert_eq!(failed[0].data["recoverable"], true);

    // No orphan subprocesses: registry count is back at baseline.
    assert_eq!(registry.live_count(), baseline);
}
