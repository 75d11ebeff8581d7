//! Configuration types and utilities for Sidekick
//!
//! Client settings come from built-in defaults, an optional TOML file and
//! finally `SIDEKICK_*` environment variables, in that order of precedence.

use crate::constants::{CONFIG_FILE, DEFAULT_API_URL, env_vars, timeouts};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// How a chunk that carries both a sentinel and content is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelPolicy {
    /// The whole chunk is the sentinel; any content in it is dropped
    #[default]
    WholeChunk,
    /// Sentinels are cut out and the surrounding content is kept
    Split,
}

/// Settings for the chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chat backend
    pub api_url: String,
    /// Bearer key sent on chat requests
    pub api_key: Option<String>,
    /// Where the session file lives
    pub data_dir: PathBuf,
    /// Timeout for non-streaming requests
    pub request_timeout_secs: u64,
    /// Longest allowed gap between reply chunks; unset waits forever
    pub stream_idle_timeout_secs: Option<u64>,
    pub sentinel_policy: SentinelPolicy,
    /// Drop reply text that arrives between the thinking markers
    pub hide_thinking_text: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            data_dir: default_data_dir(),
            request_timeout_secs: timeouts::DEFAULT_HTTP_TIMEOUT,
            stream_idle_timeout_secs: None,
            sentinel_policy: SentinelPolicy::default(),
            hide_thinking_text: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `path`, or from `config.toml` in the default
    /// data directory when no path is given, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidate = default_data_dir().join(CONFIG_FILE);
                if candidate.exists() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        debug!("Using backend {} (data dir {})", config.api_url, config.data_dir.display());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Override fields from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env_vars::API_URL).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(key) = lookup(env_vars::API_KEY).filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(dir) = lookup(env_vars::DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid api_url: {}", self.api_url))?;
        if url.host_str().is_none() {
            anyhow::bail!("api_url has no host: {}", self.api_url);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs.map(Duration::from_secs)
    }

    /// Full URL of a backend endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }
}

/// Settings for the `/api` proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Scheme, host and port of this URL replace those of proxied requests
    pub backend_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            backend_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed backend URL; fails when it has no host
    pub fn backend(&self) -> Result<reqwest::Url> {
        let url = reqwest::Url::parse(&self.backend_url)
            .with_context(|| format!("Invalid backend URL: {}", self.backend_url))?;
        if url.host_str().is_none() {
            anyhow::bail!("Backend URL has no host: {}", self.backend_url);
        }
        Ok(url)
    }
}

/// `<platform data dir>/sidekick`, or `./data` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("sidekick"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
