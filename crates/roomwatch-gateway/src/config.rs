//! Application configuration.

use std::path::Path;

use roomwatch_dashboard::DashboardConfig;
use roomwatch_serial::SerialConfig;
use roomwatch_store::StoreConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::reconnect::ReconnectConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ROOMWATCH_CONFIG";

/// Used when neither `--config` nor `ROOMWATCH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Raise log verbosity for roomwatch crates.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl AppConfig {
    /// Whether roomwatch crates log at debug level.
    ///
    /// `serial.debug` logs each reading at debug level, so it raises the
    /// filter too.
    pub fn debug_logging(&self) -> bool {
        self.debug || self.serial.debug
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Resolve and load: explicit path > `ROOMWATCH_CONFIG` > default file.
    ///
    /// An explicitly named file must exist. A missing default file yields
    /// built-in defaults.
    pub fn load(explicit: Option<String>) -> AppResult<Self> {
        let config = match explicit.or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => {
                info!(config_path = %path, "Loading configuration");
                Self::from_file(&path)?
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                info!(config_path = DEFAULT_CONFIG_PATH, "Loading configuration");
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.serial.port.trim().is_empty() {
            return Err(AppError::Config("serial.port must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(AppError::Config("serial.baud_rate must be positive".into()));
        }
        if self.serial.delimiter.is_empty() {
            return Err(AppError::Config("serial.delimiter must not be empty".into()));
        }
        if self.store.history_capacity == 0 {
            return Err(AppError::Config(
                "store.history_capacity must be positive".into(),
            ));
        }
        if self.dashboard.broadcast_capacity == 0 {
            return Err(AppError::Config(
                "dashboard.broadcast_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
