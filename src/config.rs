use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{cflog_debug, Error, Result};

/// Default wake interval for the timeout/retry monitor, in seconds.
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 60;

fn default_monitor_interval_secs() -> u64 {
    DEFAULT_MONITOR_INTERVAL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How often the timeout/retry monitor scans the active working set.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    /// Enable debug logging (also via CREWFLOW_DEBUG=1).
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
            debug: false,
        }
    }
}

impl Config {
    pub fn crewflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".crewflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::crewflow_dir()?.join("crewflow.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        cflog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            cflog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        cflog_debug!(
            "Config loaded: monitor_interval_secs={}, debug={}",
            config.monitor_interval_secs,
            config.debug
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::crewflow_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        self.save_to(&Self::config_path()?)
    }

    /// Save to an explicit path. The parent directory must exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        cflog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn monitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.monitor_interval_secs.max(1))
    }
}
