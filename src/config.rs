//! TOML configuration types and IO.
//!
//! Config keys (TOML): `[artifacts]` model_path, scaler_path, model_sha256,
//! scaler_sha256; `[feedback]` backend, csv_path, sqlite_path, sheet_url,
//! sheet_token.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::feedback;
use crate::model;

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default filename for the scaler artifact under the models directory.
pub const SCALER_FILE_NAME: &str = "risk_scaler.json";

/// Errors raised while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The application directory could not be resolved.
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    /// The config file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for the expected shape.
    #[error("Failed to parse config {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The config could not be rendered to TOML.
    #[error("Failed to serialize config {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// The config file or its temp sibling could not be written.
    #[error("Could not write to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Aggregate application configuration loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Artifact locations and integrity pins.
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    /// Feedback backend selection and settings.
    #[serde(default)]
    pub feedback: FeedbackSettings,
}

/// Locations and integrity pins for the persisted artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactSettings {
    /// Optional override for the model artifact path.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Optional override for the scaler artifact path.
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,
    /// Optional SHA-256 (hex) the model file must match at load.
    #[serde(default)]
    pub model_sha256: Option<String>,
    /// Optional SHA-256 (hex) the scaler file must match at load.
    #[serde(default)]
    pub scaler_sha256: Option<String>,
}

impl ArtifactSettings {
    /// Resolve the model artifact path, defaulting under the models dir.
    pub fn model_path(&self) -> Result<PathBuf, AppDirError> {
        match &self.model_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::models_dir()?.join(model::MODEL_FILE_NAME)),
        }
    }

    /// Resolve the scaler artifact path, defaulting under the models dir.
    pub fn scaler_path(&self) -> Result<PathBuf, AppDirError> {
        match &self.scaler_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::models_dir()?.join(SCALER_FILE_NAME)),
        }
    }
}

/// Which backend receives durable feedback rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackBackendChoice {
    /// Session-only table, lost on exit.
    #[default]
    Memory,
    /// Append-only CSV file.
    Csv,
    /// Local SQLite log.
    Sqlite,
    /// Remote spreadsheet gateway.
    Sheet,
}

/// Feedback backend selection and per-backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackSettings {
    /// Selected backend.
    #[serde(default)]
    pub backend: FeedbackBackendChoice,
    /// CSV file path override.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    /// SQLite file path override.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Sheet gateway base URL; required for the sheet backend.
    #[serde(default)]
    pub sheet_url: Option<String>,
    /// Optional bearer token for the sheet gateway.
    #[serde(default)]
    pub sheet_token: Option<String>,
}

impl FeedbackSettings {
    /// Resolve the CSV path, defaulting under the app root.
    pub fn csv_path(&self) -> Result<PathBuf, AppDirError> {
        match &self.csv_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::app_root_dir()?.join("feedback.csv")),
        }
    }

    /// Resolve the SQLite path, defaulting under the app root.
    pub fn sqlite_path(&self) -> Result<PathBuf, AppDirError> {
        match &self.sqlite_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::app_root_dir()?.join(feedback::DB_FILE_NAME)),
        }
    }
}

/// Resolve the configuration file path under the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from disk, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_from_path(&path)
}

/// Load configuration from a specific TOML file.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&data).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist configuration to disk, overwriting any previous contents.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Save configuration to a specific path, creating parent directories.
///
/// The TOML file is written atomically to prevent partial writes on crash.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, data.as_bytes())
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    use rand::TryRngCore;

    let write_error = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().ok_or_else(|| {
        write_error(std::io::Error::other("config path has no parent directory"))
    })?;
    let file_name = path
        .file_name()
        .ok_or_else(|| write_error(std::io::Error::other("config path has no file name")))?;

    let mut bytes = [0u8; 6];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|source| {
            write_error(std::io::Error::other(format!(
                "failed to generate temporary file suffix: {source}"
            )))
        })?;
    let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let tmp_path = dir.join(format!("{}.tmp-{suffix}", file_name.to_string_lossy()));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| ConfigError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    let written = file
        .write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(write_error);
    drop(file);
    if let Err(err) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }
    if let Err(source) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_error(source));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_memory_backend() {
        let config = AppConfig::default();
        assert_eq!(config.feedback.backend, FeedbackBackendChoice::Memory);
        assert!(config.artifacts.model_path.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.feedback.backend = FeedbackBackendChoice::Csv;
        config.artifacts.model_path = Some(PathBuf::from("/models/risk_model.json"));

        save_to_path(&config, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.feedback.backend, FeedbackBackendChoice::Csv);
        assert_eq!(
            loaded.artifacts.model_path.as_deref(),
            Some(Path::new("/models/risk_model.json"))
        );
    }

    #[test]
    fn backend_tokens_are_lowercase() {
        let config: AppConfig = toml::from_str(
            "[feedback]\nbackend = \"sheet\"\nsheet_url = \"https://sheets.example.com\"\n",
        )
        .unwrap();
        assert_eq!(config.feedback.backend, FeedbackBackendChoice::Sheet);
        assert_eq!(
            config.feedback.sheet_url.as_deref(),
            Some("https://sheets.example.com")
        );
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.feedback.backend, FeedbackBackendChoice::Memory);
        assert!(config.artifacts.model_sha256.is_none());
    }

    #[test]
    fn atomic_write_replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "stale").unwrap();
        save_to_path(&AppConfig::default(), &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_ne!(contents, "stale");
        // No temp siblings remain after a successful save.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
