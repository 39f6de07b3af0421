//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use voicebridge_protocol::ClientMode;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Bridge server URL
    pub server_url: String,

    /// What this client does with incoming events
    pub mode: ClientMode,

    /// Reconnect automatically when the connection drops
    pub auto_reconnect: bool,

    /// Initial delay before a reconnect attempt (seconds)
    pub reconnect_delay_secs: u64,

    /// Ceiling for the reconnect backoff (seconds)
    pub max_reconnect_delay_secs: u64,

    /// Interval between client-initiated pings (seconds)
    pub ping_interval_secs: u64,

    /// Delay between injected keystrokes (milliseconds)
    pub typing_delay_ms: u64,

    /// Longest text this client will inject; longer events are skipped
    pub max_text_len: usize,

    /// Named commands the server may trigger via execute actions.
    /// Only names listed here ever run; unknown names are ignored.
    pub actions: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            server_url: "ws://localhost:8765/bridge".to_string(),
            mode: ClientMode::Both,
            auto_reconnect: true,
            reconnect_delay_secs: 5,
            max_reconnect_delay_secs: 60,
            ping_interval_secs: 30,
            typing_delay_ms: 10,
            max_text_len: 1000,
            actions: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file, or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let mut config: ClientConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicebridge")
            .join("client.toml")
    }
}
