//! Settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stow_core::CoreConfig;
use thiserror::Error;

/// Process settings. Every field is optional in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub core: CoreConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Maximum level: `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Settings {
    pub fn from_json_str(document: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(document)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let document = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }
}
