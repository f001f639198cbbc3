//! Channel-addressed publish/subscribe fabric.
//!
//! Channels are dotted strings (`player.moved`, `processed.combat.resolved`,
//! `region.r1.movement`). Subscriptions are exact, or prefix-wildcard where
//! the trailing segment is `*` (`player.*` matches every action in the player
//! domain, and only direct actions - `region.*` does not match
//! `region.r1.movement`).
//!
//! Publishing invokes local handlers synchronously for low-latency fan-out,
//! independent of the optional remote delivery path. Delivery is best-effort:
//! a subscriber registered after a publish never sees that message, and
//! nothing is replayed.

mod derived;

use crate::error::BusError;
use crate::utils::current_timestamp_ms;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// The wire wrapper around every published payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    pub data: Value,
    pub timestamp: i64,
    pub source: String,
}

/// Handler invoked for messages on a subscribed channel or pattern.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn handle(&self, channel: &str, message: &BusMessage) -> Result<(), BusError>;

    /// Human-readable name for dispatch failure logs.
    fn name(&self) -> &str;
}

/// Wraps a plain closure as a [`ChannelHandler`].
struct FnHandler<F>
where
    F: Fn(&str, &BusMessage) -> Result<(), BusError> + Send + Sync,
{
    name: String,
    handler: F,
}

#[async_trait]
impl<F> ChannelHandler for FnHandler<F>
where
    F: Fn(&str, &BusMessage) -> Result<(), BusError> + Send + Sync,
{
    async fn handle(&self, channel: &str, message: &BusMessage) -> Result<(), BusError> {
        (self.handler)(channel, message)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Optional remote delivery path (external broker, mesh link).
///
/// A forwarding failure flips the bus to disconnected; reconnection is the
/// owning process's responsibility on restart, never the bus's.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn forward(&self, channel: &str, message: &BusMessage) -> Result<(), BusError>;
}

/// Point-in-time snapshot of bus health and activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStatus {
    pub connected: bool,
    pub active_channels: Vec<String>,
    pub published: u64,
    pub received: u64,
    pub errors: u64,
    pub last_activity: i64,
}

#[derive(Debug)]
struct BusCounters {
    connected: bool,
    published: u64,
    received: u64,
    errors: u64,
    last_activity: i64,
}

/// The broadcast bus.
///
/// Subscription maps are read-heavy and rarely mutated; mutations take the
/// write lock, dispatch takes read locks only.
pub struct BroadcastBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn ChannelHandler>>>>,
    patterns: RwLock<HashMap<String, Vec<Arc<dyn ChannelHandler>>>>,
    counters: RwLock<BusCounters>,
    source: String,
    remote: Option<Arc<dyn RemoteTransport>>,
}

impl BroadcastBus {
    /// Creates a local-only bus stamping `source` on every message.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            patterns: RwLock::new(HashMap::new()),
            counters: RwLock::new(BusCounters {
                connected: true,
                published: 0,
                received: 0,
                errors: 0,
                last_activity: current_timestamp_ms(),
            }),
            source: source.into(),
            remote: None,
        }
    }

    /// Creates a bus that also forwards every publish to a remote transport.
    pub fn with_remote(source: impl Into<String>, remote: Arc<dyn RemoteTransport>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new(source)
        }
    }

    /// Subscribes a handler to an exact channel or a `domain.*` pattern.
    pub async fn subscribe(&self, channel: &str, handler: Arc<dyn ChannelHandler>) {
        let map = if is_pattern(channel) {
            &self.patterns
        } else {
            &self.handlers
        };
        map.write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(handler);
        debug!("📡 Subscribed to {}", channel);
    }

    /// Convenience wrapper turning a closure into a subscription.
    pub async fn subscribe_fn<F>(&self, channel: &str, name: &str, handler: F)
    where
        F: Fn(&str, &BusMessage) -> Result<(), BusError> + Send + Sync + 'static,
    {
        self.subscribe(
            channel,
            Arc::new(FnHandler {
                name: name.to_string(),
                handler,
            }),
        )
        .await;
    }

    /// Drops every handler registered under the channel or pattern.
    pub async fn unsubscribe(&self, channel: &str) -> bool {
        let map = if is_pattern(channel) {
            &self.patterns
        } else {
            &self.handlers
        };
        let removed = map.write().await.remove(channel).is_some();
        if removed {
            debug!("📡 Unsubscribed from {}", channel);
        }
        removed
    }

    /// Publishes a payload on a channel.
    ///
    /// Injects `id`/`timestamp` into object payloads only when the caller
    /// omitted them, wraps the payload with `{data, timestamp, source}`,
    /// dispatches to local subscribers, forwards to the remote transport when
    /// one is attached, then applies any derived routing rules for the
    /// channel.
    pub async fn publish(&self, channel: &str, payload: Value) -> Result<(), BusError> {
        let data = self.publish_inner(channel, payload).await?;
        derived::apply(self, channel, &data).await;
        Ok(())
    }

    /// Applies the derived routing rules for an event channel to a payload
    /// without re-publishing the payload itself. Queue workers use this to
    /// fan processed results out to region-scoped channels.
    pub async fn route_derived(&self, channel: &str, payload: &Value) {
        derived::apply(self, channel, payload).await;
    }

    /// Publish without derived routing; returns the payload as delivered
    /// (identity injected) so callers can feed it to the rule table.
    async fn publish_inner(&self, channel: &str, payload: Value) -> Result<Value, BusError> {
        let payload = inject_identity(payload);
        let message = BusMessage {
            data: payload,
            timestamp: current_timestamp_ms(),
            source: self.source.clone(),
        };

        {
            let mut counters = self.counters.write().await;
            counters.published += 1;
            counters.last_activity = message.timestamp;
        }

        let delivered = self.dispatch_local(channel, &message).await;
        if delivered > 0 {
            let mut counters = self.counters.write().await;
            counters.received += 1;
            counters.last_activity = current_timestamp_ms();
        }

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.forward(channel, &message).await {
                let mut counters = self.counters.write().await;
                counters.errors += 1;
                counters.connected = false;
                error!("❌ Remote forward of {} failed: {}", channel, e);
                return Err(BusError::Transport {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(message.data)
    }

    /// Invokes exact and pattern handlers sequentially; a failing handler is
    /// logged and never blocks the rest. Returns the number of invocations.
    async fn dispatch_local(&self, channel: &str, message: &BusMessage) -> usize {
        let mut targets: Vec<Arc<dyn ChannelHandler>> = Vec::new();
        {
            let handlers = self.handlers.read().await;
            if let Some(exact) = handlers.get(channel) {
                targets.extend(exact.iter().cloned());
            }
        }
        {
            let patterns = self.patterns.read().await;
            for (pattern, handlers) in patterns.iter() {
                if pattern_matches(pattern, channel) {
                    targets.extend(handlers.iter().cloned());
                }
            }
        }

        if targets.is_empty() {
            debug!("📤 No subscribers for {}", channel);
            return 0;
        }

        let count = targets.len();
        for handler in targets {
            if let Err(e) = handler.handle(channel, message).await {
                warn!("⚠️ Handler {} failed on {}: {}", handler.name(), channel, e);
            }
        }
        count
    }

    pub async fn status(&self) -> BusStatus {
        let mut active_channels: Vec<String> = {
            let handlers = self.handlers.read().await;
            let patterns = self.patterns.read().await;
            handlers.keys().chain(patterns.keys()).cloned().collect()
        };
        active_channels.sort();

        let counters = self.counters.read().await;
        BusStatus {
            connected: counters.connected,
            active_channels,
            published: counters.published,
            received: counters.received,
            errors: counters.errors,
            last_activity: counters.last_activity,
        }
    }

    /// Tears down every subscription and marks the bus disconnected.
    pub async fn shutdown(&self) {
        self.handlers.write().await.clear();
        self.patterns.write().await.clear();
        self.counters.write().await.connected = false;
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.ends_with(".*")
}

/// `player.*` matches `player.moved` but not `player.x.y`: the wildcard
/// stands in for exactly one trailing segment.
fn pattern_matches(pattern: &str, channel: &str) -> bool {
    let Some(prefix) = pattern.strip_suffix('*') else {
        return false;
    };
    match channel.strip_prefix(prefix) {
        Some(rest) => !rest.is_empty() && !rest.contains('.'),
        None => false,
    }
}

/// Stamps `id`/`timestamp` onto object payloads that lack them.
fn inject_identity(mut payload: Value) -> Value {
    if let Some(object) = payload.as_object_mut() {
        if !object.contains_key("id") {
            object.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        }
        if !object.contains_key("timestamp") {
            object.insert("timestamp".to_string(), json!(current_timestamp_ms()));
        }
    }
    payload
}
