// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending = { RunStatus::Pending, false, true },
    running = { RunStatus::Running, false, true },
    paused = { RunStatus::Paused, false, true },
    completed = { RunStatus::Completed, true, false },
    failed = { RunStatus::Failed, true, false },
    stopped = { RunStatus::Stopped, true, false },
    superseded = { RunStatus::Superseded, true, false },
)]
fn status_classification(status: RunStatus, terminal: bool, active: bool) {
    assert_eq!(status.is_terminal(), terminal);
    assert_eq!(status.is_active(), active);
}

#[test]
fn run_ids_are_uuids() {
    let id = RunId::generate();
    assert_eq!(id.as_str().len(), 36);
    assert_ne!(id, RunId::generate());
}

#[test]
fn run_id_short_is_a_prefix() {
    let id = RunId::from_string("0f5c9a1e-aaaa-bbbb-cccc-121212121212");
    assert_eq!(id.short(), "0f5c9a1e");
}

#[test]
fn event_record_kind_parses_known_names() {
    let event = FlowEventRecord {
        seq: 1,
        run_id: RunId::generate(),
        event_type: "flow_started".into(),
        timestamp: "2026-01-05T10:00:00.000Z".into(),
        step_id: None,
        data: serde_json::Value::Null,
    };
    assert_eq!(event.kind(), car_core::FlowEventKind::FlowStarted);
}

#[test]
fn event_record_kind_tolerates_unknown_names() {
    let event = FlowEventRecord {
        seq: 1,
        run_id: RunId::generate(),
        event_type: "from_the_future".into(),
        timestamp: "2026-01-05T10:00:00.000Z".into(),
        step_id: None,
        data: serde_json::Value::Null,
    };
    assert_eq!(event.kind(), car_core::FlowEventKind::Other);
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&RunStatus::Superseded).unwrap(), "\"superseded\"");
}
