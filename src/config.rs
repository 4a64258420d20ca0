//! Harvester configuration loaded from `config.toml`.
//!
//! The file has a `[global]` table ([`GlobalSettings`]) and an `[[accounts]]`
//! array ([`Account`]). Global settings are read once; only the accounts array
//! is ever written back, through a [`ConfigStore`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::state_machine::Account;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Process-wide settings, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Seconds to sleep between rounds. Zero or negative disables the pause.
    #[serde(default = "default_request_interval")]
    pub request_interval: i64,

    /// Root of the rewards API; endpoint paths are appended after a `/`.
    pub base_url: String,

    /// Optional HTTP(S)/SOCKS proxy. Empty means no proxy.
    #[serde(default)]
    pub proxy_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_request_interval() -> i64 {
    60
}

fn default_user_agent() -> String {
    "PostmanRuntime/7.29.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            request_interval: default_request_interval(),
            base_url: String::new(),
            proxy_url: String::new(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

impl GlobalSettings {
    /// The proxy URL, if one is configured.
    pub fn proxy(&self) -> Option<&str> {
        let url = self.proxy_url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Pause between rounds; `None` when pausing is disabled.
    pub fn interval(&self) -> Option<std::time::Duration> {
        u64::try_from(self.request_interval)
            .ok()
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }
}

/// Everything in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub global: GlobalSettings,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl AppConfig {
    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if config.global.base_url.trim().is_empty() {
            anyhow::bail!("global.base_url must not be empty");
        }
        Ok(config)
    }
}

/// Persists the account list.
pub trait ConfigStore: Send + Sync {
    fn save(&self, accounts: &[Account]) -> Result<()>;
}

/// Writes accounts back into the TOML file they were loaded from.
///
/// The file is re-read on every save and only its `accounts` key is replaced,
/// so `[global]` and any keys this program does not know about are kept.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigStore for TomlConfigStore {
    fn save(&self, accounts: &[Account]) -> Result<()> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read config file {}", self.path.display()))?;
        let mut table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse config file {}", self.path.display()))?;

        let accounts = toml::Value::try_from(accounts).context("failed to encode accounts")?;
        table.insert("accounts".to_string(), accounts);
        let rendered = toml::to_string_pretty(&table).context("failed to render config")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, rendered)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
