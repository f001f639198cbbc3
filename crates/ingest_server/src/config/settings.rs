//! Configuration settings structures
//!
//! This module defines all the configuration structures used by the ingest
//! server, including network settings, broker connection details, channel
//! subscriptions and instance metadata tags.

use serde::{Deserialize, Serialize};

/// Main configuration structure
///
/// This is the root configuration object that contains all server settings.
/// It can be serialized to/from TOML format for configuration files.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    /// Network and request limits
    pub server: ServerSettings,
    /// Broker connection details for the remote delivery path
    pub broker: BrokerSettings,
    /// Channels this instance watches on startup
    pub channels: ChannelSettings,
    /// Retry defaults applied to every queue
    pub retry: RetrySettings,
    /// Instance metadata stamped on every published status object
    pub instance: InstanceSettings,
}

/// Server network settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerSettings {
    /// Network address to bind the HTTP listener to
    ///
    /// Format: "IP:PORT" (e.g., "127.0.0.1:8090" for localhost,
    /// "0.0.0.0:8090" for all interfaces)
    pub listen_addr: String,
}

/// Broker connection settings for the remote delivery path.
///
/// The bus forwards every publish to the broker when a transport is attached;
/// these settings describe where that broker lives. Credentials are optional
/// for unauthenticated development brokers.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    /// Full connection string; overrides host/port when set.
    pub connection_string: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerSettings {
    /// The effective broker address.
    pub fn address(&self) -> String {
        self.connection_string
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

/// Channels the instance subscribes a monitoring tap to at startup.
///
/// Environments usually differ here: production watches `processed.*`
/// channels only, development taps raw domains too.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChannelSettings {
    pub watch: Vec<String>,
}

/// Retry defaults applied across the queue set.
///
/// `base_delay_ms` replaces the stock base delay on every queue;
/// `max_attempts` caps each queue's own attempt count without raising it.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

/// Instance metadata tags.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InstanceSettings {
    /// Unique identifier for this process, used as the bus source tag
    pub id: String,
    /// Deployment region label
    pub region: String,
    /// Deployment environment (development, staging, production)
    pub environment: String,
}

impl Default for ServerConfig {
    /// Create a default configuration suitable for development
    fn default() -> Self {
        Self {
            server: ServerSettings {
                listen_addr: "127.0.0.1:8090".to_string(),
            },
            broker: BrokerSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                connection_string: None,
                username: None,
                password: None,
            },
            channels: ChannelSettings {
                watch: vec!["processed.*".to_string()],
            },
            retry: RetrySettings {
                max_attempts: 5,
                base_delay_ms: 2000,
            },
            instance: InstanceSettings {
                id: "meridian-dev".to_string(),
                region: "local".to_string(),
                environment: "development".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8090");
        assert_eq!(config.broker.address(), "127.0.0.1:6379");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 2000);
        assert!(!config.channels.watch.is_empty());
    }

    #[test]
    fn test_connection_string_overrides_host_port() {
        let mut config = ServerConfig::default();
        config.broker.connection_string = Some("redis://broker.internal:6380/0".to_string());
        assert_eq!(config.broker.address(), "redis://broker.internal:6380/0");
    }

    #[test]
    fn test_config_serialization() {
        let config = ServerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ServerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.server.listen_addr, deserialized.server.listen_addr);
        assert_eq!(config.broker.host, deserialized.broker.host);
        assert_eq!(config.instance.id, deserialized.instance.id);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[server]
listen_addr = "0.0.0.0:9000"

[broker]
host = "broker.internal"
port = 6380
username = "meridian"
password = "secret"

[channels]
watch = ["processed.*", "region.hub.*"]

[retry]
max_attempts = 4
base_delay_ms = 500

[instance]
id = "meridian-eu-1"
region = "eu-west"
environment = "production"
        "#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.broker.port, 6380);
        assert_eq!(config.broker.username.as_deref(), Some("meridian"));
        assert_eq!(config.channels.watch.len(), 2);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.instance.environment, "production");
    }
}
