// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_are_sane() {
    let config = EngineConfig::default();
    assert_eq!(config.stop_after_runs, None);
    assert_eq!(config.run_budget(), None);
    assert_eq!(config.turn_budget(), None);
    assert_eq!(config.prior_tail_lines, 40);
    assert_eq!(config.workspace_docs.len(), 3);
    assert!(config.constitution.contains("tickets"));
}

#[test]
fn budgets_convert_to_durations() {
    let config = EngineConfig {
        run_budget_secs: Some(3600),
        turn_budget_secs: Some(300),
        ..Default::default()
    };
    assert_eq!(config.run_budget(), Some(Duration::from_secs(3600)));
    assert_eq!(config.turn_budget(), Some(Duration::from_secs(300)));
}

#[test]
fn partial_yaml_fills_defaults() {
    let config: EngineConfig = serde_json::from_str(r#"{"stop_after_runs": 5}"#).unwrap();
    assert_eq!(config.stop_after_runs, Some(5));
    assert_eq!(config.prior_tail_lines, 40);
    assert_eq!(config.prompt.max_bytes, 32 * 1024);
}
