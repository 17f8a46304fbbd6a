// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration files and mode detection.
//!
//! Precedence, lowest to highest: built-in defaults, committed
//! `codex-autorunner.yml`, local `codex-autorunner.override.yml`, the
//! state-root `.codex-autorunner/config.yml`. The nearest state-root
//! config walking upward from the working directory decides whether a
//! process is in repo or hub mode; running a command against the wrong
//! mode is a configuration error, not a silent fallback.

use car_backend::opencode::ServerScope;
use car_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current config schema version.
pub const CONFIG_VERSION: u32 = 2;

/// Committed config file name.
pub const COMMITTED_CONFIG: &str = "codex-autorunner.yml";

/// Local (uncommitted) override file name.
pub const OVERRIDE_CONFIG: &str = "codex-autorunner.override.yml";

/// Which kind of state root a config belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Repo,
    Hub,
}

car_core::simple_display! {
    Mode {
        Repo => "repo",
        Hub => "hub",
    }
}

/// Opencode-specific knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpencodeConfig {
    pub server_scope: ServerScope,
}

/// One parsed config file (any layer of the precedence chain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub mode: Mode,
    pub version: u32,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_state_root: Option<PathBuf>,
    #[serde(default)]
    pub opencode: OpencodeConfig,
    /// Scan children of the hub root and track new repos automatically.
    #[serde(default)]
    pub auto_init_missing: bool,
}

impl ConfigFile {
    pub fn repo_defaults() -> Self {
        Self {
            mode: Mode::Repo,
            version: CONFIG_VERSION,
            engine: EngineConfig::default(),
            global_state_root: None,
            opencode: OpencodeConfig::default(),
            auto_init_missing: false,
        }
    }

    pub fn hub_defaults() -> Self {
        Self { mode: Mode::Hub, ..Self::repo_defaults() }
    }
}

/// Configuration errors. Returned to the caller, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid config: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path}: config version {found} is not supported (expected {CONFIG_VERSION})")]
    Version { path: PathBuf, found: u32 },

    #[error("this directory is in {actual} mode but the command needs {expected} mode ({path})")]
    ModeMismatch { expected: Mode, actual: Mode, path: PathBuf },

    #[error(transparent)]
    Path(#[from] car_core::PathError),
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}

fn parse_file(path: &Path) -> Result<Option<serde_yaml::Value>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
    };
    let value = serde_yaml::from_str(&content)
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })?;
    Ok(Some(value))
}

/// Overlay `over` onto `base`, recursing through mappings.
fn merge_yaml(base: &mut serde_yaml::Value, over: serde_yaml::Value) {
    match (base, over) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(over_map)) => {
            for (key, value) in over_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Load the effective config for a root, applying the precedence chain.
pub fn load_config(root: &Path, defaults: ConfigFile) -> Result<ConfigFile, ConfigError> {
    let state_config = root.join(car_core::STATE_DIR_NAME).join("config.yml");
    let mut merged = serde_yaml::to_value(&defaults)
        .map_err(|e| ConfigError::Parse { path: root.to_path_buf(), message: e.to_string() })?;
    for path in [&root.join(COMMITTED_CONFIG), &root.join(OVERRIDE_CONFIG), &state_config] {
        match parse_file(path)? {
            // An empty file parses as null; treat it like an absent layer.
            Some(layer) if !layer.is_null() => merge_yaml(&mut merged, layer),
            _ => {}
        }
    }
    let config: ConfigFile = serde_yaml::from_value(merged)
        .map_err(|e| ConfigError::Parse { path: state_config.clone(), message: e.to_string() })?;
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Version { path: state_config, found: config.version });
    }
    Ok(config)
}

/// Find the nearest state root walking upward and report its mode.
///
/// Returns the root directory (the one containing `.codex-autorunner/`)
/// and the declared mode, or `None` when no config is found.
pub fn detect_mode(cwd: &Path) -> Result<Option<(PathBuf, Mode)>, ConfigError> {
    let mut dir = Some(cwd);
    while let Some(current) = dir {
        let config_path = current.join(car_core::STATE_DIR_NAME).join("config.yml");
        if let Some(value) = parse_file(&config_path)? {
            let mode = value
                .get("mode")
                .and_then(|m| serde_yaml::from_value::<Mode>(m.clone()).ok())
                .ok_or_else(|| ConfigError::Parse {
                    path: config_path.clone(),
                    message: "missing or invalid `mode`".into(),
                })?;
            return Ok(Some((current.to_path_buf(), mode)));
        }
        dir = current.parent();
    }
    Ok(None)
}

/// Detect the mode and require it to match, with a clear error otherwise.
pub fn require_mode(cwd: &Path, expected: Mode) -> Result<PathBuf, ConfigError> {
    match detect_mode(cwd)? {
        Some((root, actual)) if actual == expected => Ok(root),
        Some((root, actual)) => Err(ConfigError::ModeMismatch {
            expected,
            actual,
            path: root.join(car_core::STATE_DIR_NAME).join("config.yml"),
        }),
        None => Err(ConfigError::Parse {
            path: cwd.to_path_buf(),
            message: format!("no {} config found walking up from here", car_core::STATE_DIR_NAME),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
