//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// TCP address the WebSocket server binds to
    pub listen_addr: String,

    /// Endpoint path clients connect to
    pub endpoint_path: String,

    /// Unix socket path for the event-ingest intake
    pub ingest_socket_path: String,

    /// Bound on each per-client send during a broadcast (seconds).
    /// A client slower than this is dropped rather than allowed to stall
    /// the fan-out.
    pub send_timeout_secs: u64,

    /// Interval between periodic status_update broadcasts (seconds)
    pub status_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            listen_addr: "0.0.0.0:8765".to_string(),
            endpoint_path: "/bridge".to_string(),
            ingest_socket_path: "/tmp/voicebridge.sock".to_string(),
            send_timeout_secs: 3,
            status_interval_secs: 60,
        }
    }
}

impl RelayConfig {
    /// Load configuration from file, or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let mut config: RelayConfig = toml::from_str(&contents)
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
            .join("relay.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire_contract() {
        let config = RelayConfig::default();
        assert_eq!(config.endpoint_path, "/bridge");
        assert!(config.listen_addr.ends_with(":8765"));
        assert!(config.send_timeout_secs > 0);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.listen_addr, config.listen_addr);
        assert_eq!(parsed.send_timeout_secs, config.send_timeout_secs);
    }
}
