//! Application configuration loaded from TOML.
//!
//! A missing configuration file is created from defaults on first run so the
//! server always starts; CLI flags override individual values afterwards.

use ingest_server::config::{
    BrokerSettings, ChannelSettings, InstanceSettings, RetrySettings, ServerConfig,
    ServerSettings,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Application configuration: the server sections plus logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub channels: ChannelSettings,
    pub retry: RetrySettings,
    pub instance: InstanceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = ServerConfig::default();
        Self {
            server: base.server,
            broker: base.broker,
            channels: base.channels,
            retry: base.retry,
            instance: base.instance,
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from file, creating a default file when absent.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Sanity-checks values a typo would most likely break.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "server.listen_addr '{}' is not a valid socket address",
                self.server.listen_addr
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.base_delay_ms == 0 {
            return Err("retry.base_delay_ms must be positive".to_string());
        }
        if self.instance.id.trim().is_empty() {
            return Err("instance.id must not be empty".to_string());
        }
        Ok(())
    }

    /// Extracts the sections the ingest server consumes.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            server: self.server.clone(),
            broker: self.broker.clone(),
            channels: self.channels.clone(),
            retry: self.retry.clone(),
            instance: self.instance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config = AppConfig::default();
        config.server.listen_addr = "not-an-address".to_string();
        assert!(config.validate().unwrap_err().contains("listen_addr"));

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.instance.id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meridian.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.server.listen_addr, "127.0.0.1:8090");

        // Round-trips through the file it just wrote.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.instance.id, config.instance.id);
    }

    #[test]
    fn test_to_server_config_carries_sections() {
        let mut config = AppConfig::default();
        config.instance.id = "meridian-eu-2".to_string();
        let server_config = config.to_server_config();
        assert_eq!(server_config.instance.id, "meridian-eu-2");
        assert_eq!(server_config.retry.max_attempts, config.retry.max_attempts);
    }
}
