//! Application configuration management.
//!
//! Configuration is stored at `~/.config/cardsync/config.json`. A few fields
//! can be overridden from the environment (`CARDSYNC_REMOTE_URL`,
//! `CARDSYNC_API_KEY`, `CARDSYNC_OWNER_ID`), which is how the CLI picks up
//! values from a `.env` file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::guard::GuardConfig;
use crate::utils::encode_component;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "cardsync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_REMOTE_URL: &str = "CARDSYNC_REMOTE_URL";
const ENV_API_KEY: &str = "CARDSYNC_API_KEY";
const ENV_OWNER_ID: &str = "CARDSYNC_OWNER_ID";

/// Largest image accepted for upload or download (10 MiB).
const DEFAULT_MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub asset_bucket: String,
    /// Endpoint probed with HEAD to decide whether the device is online.
    /// Defaults to the remote URL.
    pub probe_url: Option<String>,
    /// Owner used when no session has been persisted yet.
    pub owner_id: Option<String>,
    pub request_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub stale_after_secs: u64,
    pub max_asset_bytes: u64,
    pub guard_max_processed: usize,
    pub guard_max_tracked: usize,
    pub guard_cooldown_secs: u64,
    /// Overrides the platform cache directory.
    pub cache_root: Option<PathBuf>,
    /// Daily rolling log files are written here when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            asset_bucket: "images".to_string(),
            probe_url: None,
            owner_id: None,
            request_timeout_secs: 15,
            probe_timeout_secs: 3,
            stale_after_secs: 60 * 60,
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            guard_max_processed: 10,
            guard_max_tracked: 20,
            guard_cooldown_secs: 30,
            cache_root: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name| var(name).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_REMOTE_URL) {
            self.remote_url = Some(url);
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(owner) = non_empty(ENV_OWNER_ID) {
            self.owner_id = Some(owner);
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.cache_root {
            return Ok(root.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Key-value files for cache entries, metadata and asset mappings.
    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("store"))
    }

    pub fn assets_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("assets"))
    }

    /// Transient image-editing artifacts.
    pub fn temp_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("tmp"))
    }

    /// Persisted session for one remote endpoint.
    pub fn session_dir(&self) -> Result<PathBuf> {
        let endpoint = self.remote_url.as_deref().unwrap_or("default");
        Ok(self.cache_dir()?.join("session").join(encode_component(endpoint)))
    }

    pub fn probe_target(&self) -> Option<&str> {
        self.probe_url.as_deref().or(self.remote_url.as_deref())
    }

    pub fn guard_config(&self) -> Result<GuardConfig> {
        let mut guard = GuardConfig::new(self.temp_dir()?);
        guard.max_processed = self.guard_max_processed;
        guard.max_tracked = self.guard_max_tracked;
        guard.cooldown = Duration::from_secs(self.guard_cooldown_secs);
        Ok(guard)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}
