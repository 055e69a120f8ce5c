//! User configuration
//!
//! Stored in `~/.rsyslox/config.toml`. A missing file means defaults;
//! environment variables override whatever the file says.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use rsyslox_client::Credential;
use rsyslox_logs::{DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL_SECS};

pub const ENV_URL: &str = "RSYSLOX_URL";
pub const ENV_API_KEY: &str = "RSYSLOX_API_KEY";
pub const ENV_TOKEN: &str = "RSYSLOX_TOKEN";

const DEFAULT_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub preferences: Preferences,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            session_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "24h")]
    #[value(name = "24h")]
    H24,
    #[serde(rename = "12h")]
    #[value(name = "12h")]
    H12,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: String,
    pub time_format: TimeFormat,
    pub font_size: FontSize,
    /// Auto-refresh interval in seconds
    pub auto_refresh_interval: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            time_format: TimeFormat::default(),
            font_size: FontSize::default(),
            auto_refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".rsyslox").join("config.toml"))
    }

    /// Load from `path`, or defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        ensure!(
            config.preferences.auto_refresh_interval > 0,
            "invalid config in {}: auto_refresh_interval must be at least 1",
            path.display()
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Apply environment overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup(ENV_URL) {
            self.server.url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.server.api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.server.session_token = Some(token);
        }
    }

    /// Credential to send; a session token wins over an API key
    pub fn credential(&self) -> Option<Credential> {
        if let Some(token) = &self.server.session_token {
            return Some(Credential::SessionToken(token.clone()));
        }
        self.server.api_key.clone().map(Credential::ApiKey)
    }
}
