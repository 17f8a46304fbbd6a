// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-lock recovery and step contention specs.

use super::prelude::TestHub;
use car_core::{Destination, RepoId};
use car_engine::{lock_path, Engine, EngineConfig, EngineError, LockFileContents, StartOutcome};
use std::sync::Arc;

fn engine_for(t: &TestHub, id: &str) -> Engine<car_core::SystemClock> {
    let mut orchestrator = car_backend::Orchestrator::new(&t.root().join("global-state"));
    orchestrator.register(t.fake.clone());
    Engine::new(
        RepoId::new(id),
        t.root().join(id),
        Arc::new(orchestrator),
        Destination::Local,
        EngineConfig::default(),
        car_core::SystemClock,
    )
    .unwrap()
}

#[tokio::test]
async fn stale_lock_is_recovered_by_the_next_step() {
    let t = TestHub::new();
    t.seed_repo("api");
    t.write_ticket("api", 1, false);
    t.script_completing_turn("api", 1);
    let engine = engine_for(&t, "api");

    // A lock left behind by a dead process.
    std::fs::write(
        lock_path(&t.state_root("api")),
        serde_json::to_vec(&LockFileContents {
            pid: i32::MAX - 67,
            started_at: "2026-01-05T09:00:00.000Z".into(),
        })
        .unwrap(),
    )
    .unwrap();

    let run = match engine.start(false).unwrap() {
        StartOutcome::Created(run) => run,
        other => panic!("expected new run, got {other:?}"),
    };
    engine.run_loop(&run.id).await.unwrap();

    let types: Vec<String> =
        engine.store().get_events(&run.id, None, None).into_iter().map(|e| e.event_type).collect();
    assert!(types.contains(&"lock_recovered".to_string()));
    assert!(types.contains(&"flow_completed".to_string()));
}

#[tokio::test]
async fn concurrent_steps_on_one_repo_admit_exactly_one() {
    let t = TestHub::new();
    t.seed_repo("api");
    t.write_ticket("api", 1, false);

    // First engine's turn stays open until cancelled, pinning the lock.
    t.fake.push_hold_open(vec![car_backend::RunEvent::Delta { text: "working".into() }]);

    let holder = Arc::new(engine_for(&t, "api"));
    let run = holder.start(false).unwrap().run().clone();
    // Built after the run exists so its store replay sees it, the way a
    // second process attaching to the repo would.
    let contender = engine_for(&t, "api");
    let held_run = run.id.clone();
    let background = {
        let holder = holder.clone();
        tokio::spawn(async move { holder.run_loop(&held_run).await })
    };

    // Wait until the step owns the lock.
    let mut locked = false;
    for _ in 0..200 {
        if lock_path(&t.state_root("api")).exists() {
            locked = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(locked, "first step should take the repo lock");

    // Let the held turn's delta land so the event count is stable.
    let mut saw_delta = false;
    for _ in 0..200 {
        let types: Vec<String> = holder
            .store()
            .get_events(&run.id, None, None)
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        if types.iter().any(|t| t == "agent_stream_delta") {
            saw_delta = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(saw_delta, "held turn should stream its delta");

    let events_before = holder.store().get_events(&run.id, None, None).len();

    // The contender refuses without writing any events.
    let err = contender.step(&run.id).await.unwrap_err();
    assert!(matches!(err, EngineError::LockedAlive { .. }));
    assert_eq!(holder.store().get_events(&run.id, None, None).len(), events_before);

    // Release the held turn and let the first engine finish.
    holder.stop(&run.id).unwrap();
    background.await.unwrap().unwrap();
}
