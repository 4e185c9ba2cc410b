//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use lxps_detect::{ScanConfig, DEFAULT_MAX_INDEX, DEFAULT_PREFIXES};
use lxps_serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Baud rate applied to attached devices
    pub baud_rate: u32,
    /// Seconds a read may wait for the first byte
    pub read_timeout_secs: u64,
    /// Device name prefixes probed by the startup scan
    pub scan_prefixes: Vec<String>,
    /// Exclusive upper bound on the scanned index
    pub scan_max_index: u32,
    /// Run the startup scan
    pub initial_scan: bool,
    /// Offer to run again after the monitor stops
    pub repeat_prompt: bool,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
            scan_prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            scan_max_index: DEFAULT_MAX_INDEX,
            initial_scan: true,
            repeat_prompt: true,
            log_filter: None,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for lxps
    /// Uses $XDG_CONFIG_HOME/lxps, falls back to ~/.config/lxps
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("lxps"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("lxps"))
    }

    /// Get the default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Self {
        path.map(Path::to_path_buf)
            .or_else(Self::default_path)
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Timeout handed to the serial opener
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Scanner configuration derived from these settings
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            prefixes: self.scan_prefixes.clone(),
            max_index: self.scan_max_index,
        }
    }
}
