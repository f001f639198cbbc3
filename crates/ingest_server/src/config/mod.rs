//! Server configuration.
//!
//! Settings are loaded from TOML and can be overridden by the binary's CLI
//! flags. Every section has a sensible development default so the server
//! runs out of the box.

mod settings;

pub use settings::{
    BrokerSettings, ChannelSettings, InstanceSettings, RetrySettings, ServerConfig,
    ServerSettings,
};
