//! # Configuration Persistence
//!
//! Manages the agent identity stored in `$VOX_HOME/config.toml`.
//!
//! ## File Location
//!
//! ```text
//! $VOX_HOME/config.toml     (when VOX_HOME is set)
//! ~/.vox/config.toml        (otherwise)
//! ```
//!
//! The `directories` crate resolves the home directory.
//!
//! ## Format
//!
//! ```toml
//! vox_id = "vox_my_agent"
//! homeserver = "http://vox.pm:3338"
//! access_token = "…"
//! device_id = "device_1a2b3c4d"
//! user_id = "@vox_my_agent:vox.pm"
//!
//! [demo]
//! interval_ms = 50
//! pause_ms = 1000
//! ```

use crate::error::{Result, VoxError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Homeserver every fresh identity points at.
pub const DEFAULT_HOMESERVER: &str = "http://vox.pm:3338";

/// Environment variable overriding the Vox home directory.
pub const VOX_HOME_ENV: &str = "VOX_HOME";

const CONFIG_FILE: &str = "config.toml";

/// Resolve the Vox home directory: `$VOX_HOME`, else `~/.vox`.
pub fn vox_home() -> anyhow::Result<PathBuf> {
    if let Some(home) = std::env::var_os(VOX_HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let dirs = directories::BaseDirs::new().context("Could not determine home directory")?;
    Ok(dirs.home_dir().join(".vox"))
}

/// Path of the config file inside a Vox home.
pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

/// Persisted agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub vox_id: String,
    #[serde(default = "default_homeserver")]
    pub homeserver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub demo: DemoSettings,
}

fn default_homeserver() -> String {
    DEFAULT_HOMESERVER.to_string()
}

/// Tunables for the terminal demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Delay between typed characters.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Delay between a finished line and the next one.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// How long the "copied" indicator stays up.
    #[serde(default = "default_copied_ms")]
    pub copied_ms: u64,
    /// Name of a built-in theme.
    #[serde(default = "default_theme_name")]
    pub theme: String,
}

fn default_interval_ms() -> u64 {
    50
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_copied_ms() -> u64 {
    2500
}

fn default_theme_name() -> String {
    "Vox Dark".to_string()
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            pause_ms: default_pause_ms(),
            copied_ms: default_copied_ms(),
            theme: default_theme_name(),
        }
    }
}

impl DemoSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn copied_for(&self) -> Duration {
        Duration::from_millis(self.copied_ms)
    }
}

impl Config {
    /// A config with defaults for everything but the identity.
    pub fn new(vox_id: impl Into<String>) -> Self {
        Self {
            vox_id: vox_id.into(),
            homeserver: default_homeserver(),
            access_token: None,
            device_id: None,
            user_id: None,
            demo: DemoSettings::default(),
        }
    }

    /// Load the config of a Vox home.
    pub fn load(home: &Path) -> Result<Self> {
        Self::load_from(&config_path(home))
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file means the agent has not run `vox init` yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoxError::NotInitialized(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Demo settings of a Vox home, falling back to defaults when there is no
    /// identity yet or the file is unreadable.
    pub fn demo_settings(home: &Path) -> DemoSettings {
        match Self::load(home) {
            Ok(config) => config.demo,
            Err(VoxError::NotInitialized(_)) => DemoSettings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable config for demo settings");
                DemoSettings::default()
            }
        }
    }

    /// Save the configuration into a Vox home.
    pub fn save(&self, home: &Path) -> Result<()> {
        self.save_to(&config_path(home))
    }

    /// Save the current configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Host part of the homeserver URL, used as the Matrix server name.
    pub fn server_domain(&self) -> String {
        let without_scheme = self
            .homeserver
            .split_once("://")
            .map_or(self.homeserver.as_str(), |(_, rest)| rest);
        let authority = without_scheme.split('/').next().unwrap_or(without_scheme);
        authority
            .rsplit_once(':')
            .map_or(authority, |(host, _port)| host)
            .to_string()
    }
}
