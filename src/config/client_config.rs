use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::bluetooth::{
    BLUETOOTH_OPERATION_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SCAN_DURATION_SECS,
};

const CONFIG_DIR_NAME: &str = "gatt-console";
const CONFIG_FILE_NAME: &str = "client_config.json";

/// Console settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long each discovery scan runs, in seconds
    pub scan_duration_secs: u64,
    /// Give up on a connection attempt after this many seconds
    pub connect_timeout_secs: u64,
    /// Upper bound for read/write/subscribe round-trips, in seconds
    pub operation_timeout_secs: u64,
    /// Diagnostic log level: error, warn, info, debug or trace
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            operation_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
            log_level: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// Location of the config file in the platform config directory
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the platform config directory.
    ///
    /// A missing file yields the defaults. An unusable file or a platform without
    /// a config directory is an error; the caller falls back to defaults once
    /// logging is up, so the reason is not lost.
    pub async fn load_config() -> Result<Self> {
        Self::load_or_default(Self::config_path().as_deref()).await
    }

    async fn load_or_default(file_path: Option<&Path>) -> Result<Self> {
        let file_path = file_path.ok_or_else(|| anyhow!("no config directory on this platform"))?;
        let loaded = Self::load_from(file_path)
            .await
            .with_context(|| format!("config file {}", file_path.display()))?;
        Ok(loaded.unwrap_or_default())
    }

    /// Reads and validates a config file; `None` if it does not exist.
    pub async fn load_from(file_path: &Path) -> Result<Option<Self>> {
        if !file_path.exists() {
            return Ok(None);
        }

        let config_json = tokio::fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;
        config.validate()?;

        info!("Config loaded from {:?}", file_path);
        Ok(Some(config))
    }

    fn validate(&self) -> Result<()> {
        if self.scan_duration_secs == 0 {
            return Err(anyhow!("scan_duration_secs must be at least 1"));
        }
        if self.connect_timeout_secs == 0 || self.operation_timeout_secs == 0 {
            return Err(anyhow!("timeouts must be at least 1 second"));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("unknown log level '{}'", self.log_level))
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
