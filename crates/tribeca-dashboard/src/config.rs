/*
[INPUT]:  YAML configuration file, CLI overrides
[OUTPUT]: Parsed dashboard configuration
[POS]:    Configuration layer - connection and window setup
[UPDATE]: When adding new configuration options
*/

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tribeca_messaging::ReconnectConfig;

/// Top-level configuration for the dashboard client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// WebSocket endpoint of the trading server
    pub server_url: String,
    /// Reconnect backoff policy
    pub reconnect: ReconnectConfig,
    /// Delay before the layout settle pass after an advert or theme change
    pub settle_delay_ms: u64,
    /// Number of server messages kept in the window log
    pub message_log_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            reconnect: ReconnectConfig::default(),
            settle_delay_ms: 1_000,
            message_log_limit: 50,
        }
    }
}

fn default_server_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

impl DashboardConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).context("parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            bail!("server_url must be a ws:// or wss:// url, got `{}`", self.server_url);
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            bail!(
                "reconnect.initial_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.reconnect.initial_delay_ms,
                self.reconnect.max_delay_ms
            );
        }
        if self.message_log_limit == 0 {
            bail!("message_log_limit must be at least 1");
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
