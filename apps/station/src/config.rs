//! # Station Configuration
//!
//! Where the database lives, which scale to open, and where shipment
//! folders are created.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults                                                            │
//! │  2. station.toml in the platform config dir                             │
//! │     • Linux:   ~/.config/station/station.toml                           │
//! │     • macOS:   ~/Library/Application Support/com.packing.station/       │
//! │     • Windows: %APPDATA%\packing\station\config\                        │
//! │  3. Environment                                                         │
//! │     PACKING_DB_PATH, PACKING_SCHEMA_PATH, PACKING_SCALE_PORT,           │
//! │     PACKING_SCALE_BAUD, PACKING_SHIPMENTS_ROOT                          │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use packing_db::{DbConfig, SnapshotPolicy, DATABASE_FILE_NAME};
use packing_scale::ScaleConfig;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "station.toml";

pub const ENV_DB_PATH: &str = "PACKING_DB_PATH";
pub const ENV_SCHEMA_PATH: &str = "PACKING_SCHEMA_PATH";
pub const ENV_SCALE_PORT: &str = "PACKING_SCALE_PORT";
pub const ENV_SCALE_BAUD: &str = "PACKING_SCALE_BAUD";
pub const ENV_SHIPMENTS_ROOT: &str = "PACKING_SHIPMENTS_ROOT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "packing", "station")
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Default: `warehouse.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Bootstrap schema. When set, no other location is searched.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    #[serde(default)]
    pub snapshot: SnapshotPolicy,
}

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory that receives the `shipments/` tree. Default: the data dir.
    #[serde(default)]
    pub shipments_root: Option<PathBuf>,
}

// =============================================================================
// Station Configuration
// =============================================================================

/// Complete station configuration.
///
/// ## Example Config File
/// ```toml
/// [database]
/// path = "D:/station/warehouse.db"
/// snapshot = "every_call"
///
/// [scale]
/// port = "COM3"
/// baud_rate = 9600
///
/// [storage]
/// shipments_root = "D:/station"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub scale: ScaleConfig,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl StationConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading station config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration as TOML, creating the directory if needed.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Station config saved");
        Ok(())
    }

    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Rejects values the store or the scale cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scale.baud_rate == 0 {
            return Err(ConfigError::Invalid("scale.baud_rate must be greater than 0".into()));
        }
        if self.scale.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scale.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.scale.immediate_attempts == 0 || self.scale.stable_attempts == 0 {
            return Err(ConfigError::Invalid(
                "scale attempt ceilings must be greater than 0".into(),
            ));
        }
        if self
            .scale
            .port
            .as_deref()
            .is_some_and(|port| port.trim().is_empty())
        {
            return Err(ConfigError::Invalid("scale.port must not be blank".into()));
        }
        if self
            .database
            .path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        Ok(())
    }

    /// Applies overrides from `lookup` (the process environment in
    /// [`load`](Self::load)).
    ///
    /// An empty `PACKING_SCALE_PORT` disables the startup connection. An
    /// unparsable baud rate is ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup(ENV_SCHEMA_PATH) {
            debug!(path = %path, "Overriding schema path from environment");
            self.database.schema_path = Some(PathBuf::from(path));
        }

        if let Some(port) = lookup(ENV_SCALE_PORT) {
            let port = port.trim().to_string();
            debug!(port = %port, "Overriding scale port from environment");
            self.scale.port = if port.is_empty() { None } else { Some(port) };
        }

        if let Some(baud) = lookup(ENV_SCALE_BAUD) {
            match baud.trim().parse::<u32>() {
                Ok(baud_rate) => self.scale.baud_rate = baud_rate,
                Err(_) => warn!(value = %baud, "Ignoring invalid {}", ENV_SCALE_BAUD),
            }
        }

        if let Some(root) = lookup(ENV_SHIPMENTS_ROOT) {
            debug!(root = %root, "Overriding shipments root from environment");
            self.storage.shipments_root = Some(PathBuf::from(root));
        }
    }

    // =========================================================================
    // Resolved paths
    // =========================================================================

    /// The database file, falling back to the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
    }

    /// Directory that receives the `shipments/` tree, falling back to the
    /// platform data dir.
    pub fn shipments_root(&self) -> PathBuf {
        self.storage
            .shipments_root
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Store configuration derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        let config = DbConfig::new(self.database_path()).snapshot_policy(self.database.snapshot);
        match &self.database.schema_path {
            Some(schema) => config.schema_path(schema),
            None => config,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
