// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use car_core::RepoKind;
use tempfile::tempdir;

fn entry(id: &str) -> RepoEntry {
    RepoEntry::base(RepoId::new(id), PathBuf::from(id))
}

#[test]
fn missing_manifest_loads_empty() {
    let dir = tempdir().unwrap();
    let manifest = Manifest::load(dir.path()).unwrap();
    assert_eq!(manifest.version, MANIFEST_VERSION);
    assert!(manifest.repos.is_empty());
}

#[test]
fn save_load_roundtrip_is_identical() {
    let dir = tempdir().unwrap();
    let mut manifest = Manifest::default();
    manifest.upsert(entry("api"));
    let mut wt = entry("api-wt-auth");
    wt.kind = RepoKind::Worktree;
    wt.base_repo_id = Some(RepoId::new("api"));
    wt.branch = Some("auth".into());
    manifest.upsert(wt);

    manifest.save(dir.path()).unwrap();
    let loaded = Manifest::load(dir.path()).unwrap();

    assert_eq!(loaded, manifest);

    // Saving the loaded copy produces identical bytes.
    let first = std::fs::read(manifest_path(dir.path())).unwrap();
    loaded.save(dir.path()).unwrap();
    let second = std::fs::read(manifest_path(dir.path())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn upsert_replaces_by_id() {
    let mut manifest = Manifest::default();
    manifest.upsert(entry("api"));
    let mut updated = entry("api");
    updated.auto_run = true;
    manifest.upsert(updated);

    assert_eq!(manifest.repos.len(), 1);
    assert!(manifest.entry(&RepoId::new("api")).unwrap().auto_run);
}

#[test]
fn remove_is_explicit_and_returns_the_entry() {
    let mut manifest = Manifest::default();
    manifest.upsert(entry("api"));

    let removed = manifest.remove(&RepoId::new("api")).unwrap();
    assert_eq!(removed.id, RepoId::new("api"));
    assert!(manifest.repos.is_empty());
    assert!(manifest.remove(&RepoId::new("api")).is_none());
}

#[test]
fn malformed_manifest_is_a_config_error() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".codex-autorunner")).unwrap();
    std::fs::write(manifest_path(dir.path()), "version: [broken\n").unwrap();

    assert!(Manifest::load(dir.path()).is_err());
}
