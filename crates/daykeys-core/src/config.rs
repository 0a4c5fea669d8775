//! TOML-based engine configuration.
//!
//! Stores:
//! - Chord timeout, sequence length cap and history size
//! - Keyboard shortcut overrides for the default commands
//! - The view the app starts in
//!
//! Configuration is stored at `~/.config/daykeys/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::registry::{
    RegistryConfig, DEFAULT_CHORD_TIMEOUT_MS, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_SEQUENCE_LEN,
};
use crate::types::ViewMode;

/// Key dispatch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_chord_timeout_ms")]
    pub chord_timeout_ms: u64,
    #[serde(default = "default_max_sequence_len")]
    pub max_sequence_len: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

/// Keyboard shortcut overrides: command id -> key (`"g t"` for chords).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShortcutsConfig {
    #[serde(default)]
    pub bindings: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewConfig {
    #[serde(default)]
    pub default_view: ViewMode,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/daykeys/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub shortcuts: ShortcutsConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

fn default_chord_timeout_ms() -> u64 {
    DEFAULT_CHORD_TIMEOUT_MS
}
fn default_max_sequence_len() -> usize {
    DEFAULT_MAX_SEQUENCE_LEN
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            chord_timeout_ms: default_chord_timeout_ms(),
            max_sequence_len: default_max_sequence_len(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl From<&DispatchConfig> for RegistryConfig {
    fn from(dispatch: &DispatchConfig) -> Self {
        Self {
            chord_timeout_ms: dispatch.chord_timeout_ms,
            max_sequence_len: dispatch.max_sequence_len,
            history_capacity: dispatch.history_capacity,
        }
    }
}

/// Returns `~/.config/daykeys[-dev]/` based on DAYKEYS_ENV.
///
/// Set DAYKEYS_ENV=dev to use the development config directory.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DAYKEYS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("daykeys-dev")
    } else {
        base_dir.join("daykeys")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without persisting.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a value by key and save to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::from(&self.dispatch)
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.dispatch.chord_timeout_ms, 500);
        assert_eq!(parsed.dispatch.history_capacity, 100);
        assert_eq!(parsed.view.default_view, ViewMode::Schedule);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [dispatch]
            chord_timeout_ms = 750

            [shortcuts.bindings]
            toggle-view = "f2"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dispatch.chord_timeout_ms, 750);
        assert_eq!(cfg.dispatch.max_sequence_len, 3);
        assert_eq!(cfg.shortcuts.bindings.get("toggle-view").map(String::as_str), Some("f2"));
        assert_eq!(cfg.registry_config().chord_timeout_ms, 750);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("dispatch.chord_timeout_ms").as_deref(), Some("500"));
        assert_eq!(cfg.get("view.default_view").as_deref(), Some("schedule"));
        assert!(cfg.get("dispatch.missing").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("dispatch.history_capacity", "20").unwrap();
        cfg.apply("view.default_view", "you").unwrap();
        cfg.apply("shortcuts.bindings", r#"{"show-help":"h"}"#).unwrap();
        assert_eq!(cfg.dispatch.history_capacity, 20);
        assert_eq!(cfg.view.default_view, ViewMode::You);
        assert_eq!(cfg.shortcuts.bindings.len(), 1);
    }

    #[test]
    fn apply_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.apply("dispatch.nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.apply("dispatch.chord_timeout_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("view.default_view", "calendar"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.view.default_view, ViewMode::Schedule);
    }

    #[test]
    fn load_from_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.dispatch.chord_timeout_ms, 500);

        let mut changed = cfg.clone();
        changed.apply("dispatch.chord_timeout_ms", "900").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().dispatch.chord_timeout_ms, 900);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "dispatch = 3").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }
}
