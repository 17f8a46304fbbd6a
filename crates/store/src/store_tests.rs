// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::types::TICKET_FLOW;
use proptest::prelude::*;
use tempfile::tempdir;

const NOW: &str = "2026-01-05T10:00:00.000Z";
const LATER: &str = "2026-01-05T11:00:00.000Z";

fn open_store(dir: &tempfile::TempDir) -> FlowStore {
    FlowStore::open(&dir.path().join("flows.db")).unwrap()
}

#[test]
fn create_run_starts_pending() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();

    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.created_at, NOW);
    assert!(run.started_at.is_none());
    assert_eq!(store.get_run(&run.id).unwrap(), run);
}

#[test]
fn running_stamps_started_at_once() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();

    let updated = store.set_run_status(&run.id, RunStatus::Running, None, None, NOW).unwrap();
    assert_eq!(updated.started_at.as_deref(), Some(NOW));

    store.set_run_status(&run.id, RunStatus::Paused, None, None, LATER).unwrap();
    let resumed = store.set_run_status(&run.id, RunStatus::Running, None, None, LATER).unwrap();
    assert_eq!(resumed.started_at.as_deref(), Some(NOW));
}

#[test]
fn terminal_runs_are_frozen() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
    store.set_run_status(&run.id, RunStatus::Completed, None, None, LATER).unwrap();

    let err = store.set_run_status(&run.id, RunStatus::Running, None, None, LATER).unwrap_err();
    assert!(matches!(
        err,
        StoreError::IllegalTransition { from: RunStatus::Completed, to: RunStatus::Running, .. }
    ));

    let err = store
        .append_event(&run.id, FlowEventKind::AgentStreamDelta, serde_json::json!({}), None, LATER)
        .unwrap_err();
    assert!(matches!(err, StoreError::TerminalRun(_)));

    let err = store.patch_run_state(&run.id, serde_json::json!({"x": 1})).unwrap_err();
    assert!(matches!(err, StoreError::TerminalRun(_)));
}

#[test]
fn terminal_status_stamps_finished_at() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();

    let updated = store
        .set_run_status(&run.id, RunStatus::Failed, None, Some("boom".into()), LATER)
        .unwrap();

    assert_eq!(updated.finished_at.as_deref(), Some(LATER));
    assert_eq!(updated.error.as_deref(), Some("boom"));
}

#[test]
fn append_event_assigns_monotonic_seq() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let a = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
    let b = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();

    let s1 = store
        .append_event(&a.id, FlowEventKind::FlowStarted, serde_json::json!({}), None, NOW)
        .unwrap();
    let s2 = store
        .append_event(&b.id, FlowEventKind::FlowStarted, serde_json::json!({}), None, NOW)
        .unwrap();
    let s3 = store
        .append_event(&a.id, FlowEventKind::StepStarted, serde_json::json!({}), None, NOW)
        .unwrap();

    assert_eq!((s1, s2, s3), (1, 2, 3));
}

#[test]
fn seq_survives_reopen() {
    let dir = tempdir().unwrap();
    let run_id;
    {
        let store = open_store(&dir);
        let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
        run_id = run.id.clone();
        store
            .append_event(&run.id, FlowEventKind::FlowStarted, serde_json::json!({}), None, NOW)
            .unwrap();
    }

    let store = open_store(&dir);
    let seq = store
        .append_event(&run_id, FlowEventKind::StepStarted, serde_json::json!({}), None, LATER)
        .unwrap();
    assert_eq!(seq, 2);
}

#[test]
fn get_events_filters_by_cursor_and_type() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
    for kind in [
        FlowEventKind::FlowStarted,
        FlowEventKind::StepStarted,
        FlowEventKind::AgentStreamDelta,
        FlowEventKind::AgentStreamDelta,
    ] {
        store.append_event(&run.id, kind, serde_json::json!({}), None, NOW).unwrap();
    }

    let all = store.get_events(&run.id, None, None);
    assert_eq!(all.len(), 4);

    let after = store.get_events(&run.id, Some(2), None);
    assert_eq!(after.len(), 2);
    assert!(after.iter().all(|e| e.seq > 2));

    let deltas = store.get_events(&run.id, None, Some(&["agent_stream_delta"]));
    assert_eq!(deltas.len(), 2);
}

#[test]
fn list_runs_newest_first_with_filters() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let a = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
    let b = store.create_run(TICKET_FLOW, serde_json::json!({}), LATER).unwrap();
    store.set_run_status(&a.id, RunStatus::Completed, None, None, LATER).unwrap();

    let all = store.list_runs(&RunFilter::default());
    assert_eq!(all[0].id, b.id);
    assert_eq!(all[1].id, a.id);

    let completed = store.list_runs(&RunFilter {
        statuses: Some(vec![RunStatus::Completed]),
        ..Default::default()
    });
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, a.id);

    let limited = store.list_runs(&RunFilter { limit: Some(1), ..Default::default() });
    assert_eq!(limited.len(), 1);
}

#[test]
fn active_run_finds_paused() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
    store.set_run_status(&run.id, RunStatus::Paused, None, None, LATER).unwrap();

    assert_eq!(store.active_run(TICKET_FLOW).unwrap().id, run.id);

    store.set_run_status(&run.id, RunStatus::Stopped, None, None, LATER).unwrap();
    assert!(store.active_run(TICKET_FLOW).is_none());
}

#[test]
fn patch_run_state_merges_shallow() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store
        .create_run(TICKET_FLOW, serde_json::json!({"keep": 1, "drop": 2}), NOW)
        .unwrap();

    let updated = store
        .patch_run_state(&run.id, serde_json::json!({"drop": null, "new": "v"}))
        .unwrap();

    assert_eq!(updated.state, serde_json::json!({"keep": 1, "new": "v"}));
}

#[test]
fn record_artifact_and_list() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();

    store
        .record_artifact(
            &run.id,
            "run_log",
            std::path::Path::new("runs/x/run.log"),
            serde_json::json!({"bytes": 12}),
            NOW,
        )
        .unwrap();

    let artifacts = store.get_artifacts(&run.id);
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].kind, "run_log");
}

#[test]
fn unknown_run_is_an_error() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let ghost = RunId::generate();

    assert!(matches!(
        store.append_event(&ghost, FlowEventKind::FlowStarted, serde_json::json!({}), None, NOW),
        Err(StoreError::UnknownRun(_))
    ));
    assert!(matches!(
        store.set_run_status(&ghost, RunStatus::Running, None, None, NOW),
        Err(StoreError::UnknownRun(_))
    ));
}

#[test]
fn everything_survives_reopen() {
    let dir = tempdir().unwrap();
    let run_id;
    {
        let store = open_store(&dir);
        let run = store.create_run(TICKET_FLOW, serde_json::json!({"n": 1}), NOW).unwrap();
        run_id = run.id.clone();
        store.set_run_status(&run.id, RunStatus::Running, None, None, NOW).unwrap();
        store
            .append_event(&run.id, FlowEventKind::FlowStarted, serde_json::json!({}), None, NOW)
            .unwrap();
        store
            .record_artifact(&run.id, "run_log", std::path::Path::new("r.log"), serde_json::Value::Null, NOW)
            .unwrap();
    }

    let store = open_store(&dir);
    let run = store.get_run(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.state, serde_json::json!({"n": 1}));
    assert_eq!(store.get_events(&run_id, None, None).len(), 1);
    assert_eq!(store.get_artifacts(&run_id).len(), 1);
}

proptest! {
    /// Events read back equal events appended, in seq order, for any
    /// interleaving across runs.
    #[test]
    fn events_read_back_in_append_order(appends in proptest::collection::vec(0usize..3, 1..40)) {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let runs: Vec<_> = (0..3)
            .map(|_| store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap())
            .collect();

        let mut expected: Vec<Vec<u64>> = vec![Vec::new(); 3];
        for (i, &target) in appends.iter().enumerate() {
            let seq = store
                .append_event(
                    &runs[target].id,
                    FlowEventKind::AgentStreamDelta,
                    serde_json::json!({"i": i}),
                    None,
                    NOW,
                )
                .unwrap();
            expected[target].push(seq);
        }

        for (target, run) in runs.iter().enumerate() {
            let got: Vec<u64> =
                store.get_events(&run.id, None, None).iter().map(|e| e.seq).collect();
            prop_assert_eq!(&got, &expected[target]);
            let mut sorted = got.clone();
            sorted.sort_unstable();
            prop_assert_eq!(got, sorted);
        }
    }

    /// No transition out of a terminal status ever succeeds.
    #[test]
    fn terminal_runs_reject_every_transition(
        terminal in prop_oneof![
            Just(RunStatus::Completed),
            Just(RunStatus::Failed),
            Just(RunStatus::Stopped),
            Just(RunStatus::Superseded),
        ],
        next in prop_oneof![
            Just(RunStatus::Pending),
            Just(RunStatus::Running),
            Just(RunStatus::Paused),
            Just(RunStatus::Completed),
            Just(RunStatus::Failed),
            Just(RunStatus::Stopped),
            Just(RunStatus::Superseded),
        ],
    ) {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let run = store.create_run(TICKET_FLOW, serde_json::json!({}), NOW).unwrap();
        store.set_run_status(&run.id, terminal, None, None, NOW).unwrap();

        prop_assert!(store.set_run_status(&run.id, next, None, None, LATER).is_err());
    }
}
