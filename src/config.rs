//! Application configuration.
//!
//! Stored as TOML at `~/.config/campaign-insights/config.toml` (or the XDG
//! equivalent). Every field is optional; environment variables (also read
//! from a `.env` file) override the file.
//!
//! ```toml
//! database_path = "/data/marketing.db"
//! output_dir = "plots_output"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_DB_PATH: &str = "INSIGHTS_DB_PATH";
pub const ENV_OUTPUT_DIR: &str = "INSIGHTS_OUTPUT_DIR";

const APP_DIR: &str = "campaign-insights";

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "campaign-insights", APP_DIR).map_or_else(
        || PathBuf::from("marketing.db"),
        |dirs| dirs.data_dir().join("marketing.db"),
    )
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots_output")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite file holding `marketing_data`.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory for trend CSV/PNG artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl AppConfig {
    /// Load from the default location, then apply environment overrides.
    ///
    /// A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)?.with_env_overrides(|key| dotenvy::var(key).ok())
    }

    /// Load from a specific path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Default configuration file path.
    ///
    /// - Primary: `$XDG_CONFIG_HOME/campaign-insights/config.toml`
    /// - Fallback: platform config dir
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = dotenvy::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join("config.toml"));
        }
        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Apply `INSIGHTS_DB_PATH` / `INSIGHTS_OUTPUT_DIR` from `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(db) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty".into(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("output_dir cannot be empty".into()));
        }
        Ok(())
    }
}
