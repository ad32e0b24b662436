//! Client configuration at `~/.wterm/config.toml`.
//!
//! Names the shell proxy and the connection defaults. CLI flags always
//! override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use wterm_client::GatewayConfig;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the shell proxy lives.
    #[serde(default)]
    pub gateway: GatewaySection,

    /// Connection defaults.
    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// REST base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// WebSocket base URL; derived from `api_url` when absent.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    /// SSH port on the remote host.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for targets given without `user@`.
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            username: None,
        }
    }
}

fn default_api_url() -> String {
    wterm_client::gateway::DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_port() -> u16 {
    22
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `~/.wterm/config.toml`.
    pub fn default_path() -> std::path::PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".wterm")
            .join("config.toml")
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_url: self.gateway.api_url.clone(),
            ws_url: self.gateway.ws_url.clone(),
            timeout_secs: self.gateway.timeout_secs,
        }
    }
}

/// Parse a `[user@]host` string into `(user, host)`.
///
/// Without `user@`, falls back to `default_user`, then the current system
/// username, then "root".
pub fn parse_target(target: &str, default_user: Option<&str>) -> Result<(String, String)> {
    if let Some((user, host)) = target.split_once('@') {
        if user.is_empty() {
            anyhow::bail!("empty username in target '{target}'");
        }
        if host.is_empty() {
            anyhow::bail!("empty host in target '{target}'");
        }
        Ok((user.to_string(), host.to_string()))
    } else {
        if target.is_empty() {
            anyhow::bail!("empty host");
        }
        let user = match default_user {
            Some(user) => user.to_string(),
            None => std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "root".into()),
        };
        Ok((user, target.to_string()))
    }
}
