//! Configuration types for BOTBRAIN

use crate::error::BrainError;
use crate::traits::BrainResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default autosave period, applied when the host reports it is running
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 5;

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Brain configuration
    pub brain: BrainConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// API configuration
    pub api: ApiConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "botbrain-node".to_string(),
            data_dir: PathBuf::from("./data"),
            brain: BrainConfig::default(),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> BrainResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BrainError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> BrainResult<Self> {
        serde_json::from_str(json).map_err(|e| BrainError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> BrainResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Location of the sled database, resolved against the data directory
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.path)
    }
}

/// Brain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Autosave period in seconds
    pub save_interval_secs: u64,

    /// Whether autosave ticks emit a save
    pub auto_save: bool,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            auto_save: true,
        }
    }
}

/// Persistence adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database directory, relative to the data directory
    pub path: PathBuf,

    /// Key the snapshot is stored under
    pub snapshot_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("brain"),
            snapshot_key: "brain".to_string(),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP API
    pub enabled: bool,

    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:8080".to_string(),
            enable_cors: true,
        }
    }
}
