use crate::session::DEFAULT_AUTOSAVE_DELAY;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    Invalid(String),
    ProjectDir,
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config io error: {err}"),
            Self::Serde(err) => write!(f, "config is not valid JSON: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
            Self::ProjectDir => write!(f, "could not determine the user's config directory"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("app", "quillpad", "Quillpad").ok_or(ConfigError::ProjectDir)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where notes are stored; the platform data directory when unset.
    pub data_dir: Option<PathBuf>,
    pub autosave_delay_ms: u64,
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY.as_millis() as u64,
            log_filter: None,
        }
    }
}

impl AppConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// A zero delay would save on every keystroke and is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.log_filter.as_deref().is_some_and(|filter| filter.trim().is_empty()) {
            return Err(ConfigError::Invalid("log_filter must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }
}

pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn default_store() -> Result<Self, ConfigError> {
        Ok(Self::new(project_dirs()?.config_dir().join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Strict read: a missing file gives defaults, anything unparsable or out
    /// of range is an error.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_path.exists() {
            return Ok(AppConfig::default());
        }
        let raw = fs::read_to_string(&self.config_path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a malformed or invalid file falls back to defaults
    /// with a warning. Read failures still propagate.
    pub fn load_or_default(&self) -> Result<AppConfig, ConfigError> {
        match self.load() {
            Ok(config) => Ok(config),
            Err(ConfigError::Serde(err)) => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    error = %err,
                    "config is not valid JSON, using defaults"
                );
                Ok(AppConfig::default())
            }
            Err(ConfigError::Invalid(reason)) => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    %reason,
                    "config rejected, using defaults"
                );
                Ok(AppConfig::default())
            }
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, data)?;
        Ok(())
    }
}
