use crate::error::AppError;
use crate::repository::SaveMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKSHEET_CONFIG_PATH";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub save_mode: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    /// The configured save mode, or the default when none is set.
    pub fn save_mode(&self) -> Result<SaveMode, AppError> {
        match self.save_mode.as_deref() {
            Some(raw) => parse_save_mode(raw),
            None => Ok(SaveMode::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub save_mode: Option<String>,
    pub log_level: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    app_data_path(CONFIG_FILE_NAME)
}

/// Per-user location of `file_name`: `%APPDATA%\tasksheet` on Windows,
/// `~/.config/tasksheet` elsewhere.
pub fn app_data_path(file_name: &str) -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("tasksheet").join(file_name))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("tasksheet")
            .join(file_name))
    }
}

/// Loads the config file, falling back to defaults. A missing file is not an
/// error; an unreadable or invalid one is reported alongside the defaults.
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    normalize_config(config)
        .map_err(|err| AppError::invalid_data(format!("{}: {}", path.display(), err.message())))
}

fn normalize_config(mut config: Config) -> Result<Config, AppError> {
    if let Some(raw) = config.save_mode.take() {
        config.save_mode = Some(parse_save_mode(&raw)?.as_str().to_string());
    }
    config.log_level = config
        .log_level
        .map(|level| level.trim().to_string())
        .filter(|level| !level.is_empty());
    Ok(config)
}

pub fn parse_save_mode(raw: &str) -> Result<SaveMode, AppError> {
    match canonical_key(raw).as_deref() {
        Some("background" | "async" | "bg") => Ok(SaveMode::Background),
        Some("blocking" | "sync" | "inline") => Ok(SaveMode::Blocking),
        _ => Err(AppError::invalid_input(format!(
            "unknown save mode '{}'",
            raw.trim()
        ))),
    }
}

/// Lowercases and collapses any run of non-alphanumerics into a single `_`.
pub fn canonical_key(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Result<Config, AppError> {
    let mut merged = base.clone();
    if let Some(path) = overrides.store_path.as_ref() {
        merged.store_path = Some(path.clone());
    }

    if let Some(mode) = overrides.save_mode.as_deref() {
        merged.save_mode = Some(parse_save_mode(mode)?.as_str().to_string());
    }

    if let Some(level) = overrides.log_level.as_ref() {
        merged.log_level = Some(level.trim().to_string());
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, app_data_path, canonical_key, load_config_from_path,
        load_config_with_fallback_from_path, merge_overrides, parse_save_mode,
    };
    use crate::repository::SaveMode;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_with_fallback_from_path(&dir.path().join("missing.json"));

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn load_config_reads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid-config.json");
        let content = serde_json::json!({
            "store_path": "/tmp/tasks.json",
            "save_mode": "Sync",
            "log_level": " debug "
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();

        assert_eq!(loaded.store_path, Some(PathBuf::from("/tmp/tasks.json")));
        assert_eq!(loaded.save_mode.as_deref(), Some("blocking"));
        assert_eq!(loaded.log_level.as_deref(), Some("debug"));
        assert_eq!(loaded.save_mode().unwrap(), SaveMode::Blocking);
    }

    #[test]
    fn load_config_rejects_unknown_save_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-mode.json");
        fs::write(&path, r#"{ "save_mode": "eventually" }"#).unwrap();

        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn default_save_mode_is_background() {
        assert_eq!(Config::default().save_mode().unwrap(), SaveMode::Background);
    }

    #[test]
    fn merge_overrides_replaces_only_given_fields() {
        let base = Config {
            store_path: Some(PathBuf::from("a.json")),
            save_mode: Some("background".into()),
            log_level: Some("warn".into()),
        };
        let overrides = ConfigOverrides {
            save_mode: Some("BLOCKING".into()),
            ..ConfigOverrides::default()
        };

        let merged = merge_overrides(&base, &overrides).unwrap();

        assert_eq!(merged.store_path, base.store_path);
        assert_eq!(merged.save_mode.as_deref(), Some("blocking"));
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert_eq!(base.save_mode.as_deref(), Some("background"));
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config {
            store_path: Some(PathBuf::from("a.json")),
            save_mode: None,
            log_level: None,
        };

        let merged = merge_overrides(&base, &ConfigOverrides::default()).unwrap();

        assert_eq!(merged, base);
    }

    #[test]
    fn merge_overrides_rejects_unknown_save_mode() {
        let overrides = ConfigOverrides {
            save_mode: Some("later".into()),
            ..ConfigOverrides::default()
        };

        let err = merge_overrides(&Config::default(), &overrides).unwrap_err();

        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn save_mode_variants_are_canonicalised() {
        assert_eq!(parse_save_mode("Background").unwrap(), SaveMode::Background);
        assert_eq!(parse_save_mode(" async ").unwrap(), SaveMode::Background);
        assert_eq!(parse_save_mode("SYNC").unwrap(), SaveMode::Blocking);
        assert!(parse_save_mode("  ").is_err());
    }

    #[test]
    fn canonical_key_collapses_separators() {
        assert_eq!(canonical_key("Store-Path"), Some("store_path".into()));
        assert_eq!(canonical_key("  LOG  level "), Some("log_level".into()));
        assert_eq!(canonical_key("--"), None);
    }

    #[cfg(unix)]
    #[test]
    fn app_data_path_shares_the_tasksheet_directory() {
        let config = app_data_path("config.json").unwrap();
        let store = app_data_path("task_manager_data.json").unwrap();

        assert!(config.ends_with(".config/tasksheet/config.json"));
        assert_eq!(config.parent(), store.parent());
    }
}
