//! Per-domain transformation of raw payloads into canonical shapes.
//!
//! The domain (text before the first `.` of the event type) selects a
//! transformer. Each transformer is a pure function from a raw payload to the
//! canonical, enriched representation its domain's processors expect. Domains
//! with no registered transformer pass the raw payload through unchanged -
//! the same compatibility policy the validator applies to unknown types.

mod chat;
mod combat;
mod player;
mod world;

pub use chat::ChatTransformer;
pub use combat::CombatTransformer;
pub use player::PlayerTransformer;
pub use world::WorldTransformer;

use crate::error::TransformError;
use crate::types::EventType;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A pure per-domain payload transformation.
///
/// Implementations must not hold mutable state: the registry invokes them
/// concurrently from many workers. A returned error aborts processing of that
/// one event and propagates to the caller; it must not affect other events.
pub trait EventTransformer: Send + Sync {
    /// The domain this transformer claims, e.g. `"player"`.
    fn domain(&self) -> &'static str;

    /// Reshapes a raw payload into this domain's canonical form.
    fn transform(&self, event_type: &EventType, raw: &Value) -> Result<Value, TransformError>;
}

/// Registry mapping domains to transformers.
///
/// Populated at startup; lookups are read-locked and cheap. Unknown domains
/// fall through to pass-through rather than failing.
pub struct TransformerRegistry {
    transformers: RwLock<HashMap<String, Arc<dyn EventTransformer>>>,
}

impl TransformerRegistry {
    /// Creates an empty registry where every domain passes through.
    pub fn new() -> Self {
        Self {
            transformers: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with the stock gameplay transformers installed.
    pub fn with_default_transformers() -> Self {
        let registry = Self::new();
        let stock: Vec<Arc<dyn EventTransformer>> = vec![
            Arc::new(PlayerTransformer),
            Arc::new(CombatTransformer),
            Arc::new(ChatTransformer),
            Arc::new(WorldTransformer),
        ];
        {
            let mut transformers = registry
                .transformers
                .try_write()
                .expect("new registry is uncontended");
            for transformer in stock {
                transformers.insert(transformer.domain().to_string(), transformer);
            }
        }
        registry
    }

    /// Registers (or replaces) the transformer for its claimed domain.
    pub async fn register(&self, transformer: Arc<dyn EventTransformer>) {
        let domain = transformer.domain().to_string();
        self.transformers.write().await.insert(domain.clone(), transformer);
        debug!("🔁 Registered transformer for domain '{}'", domain);
    }

    /// Removes the transformer for a domain, restoring pass-through.
    pub async fn unregister(&self, domain: &str) -> bool {
        self.transformers.write().await.remove(domain).is_some()
    }

    /// Transforms `raw` via the domain's transformer, or clones it unchanged
    /// when no transformer is registered.
    pub async fn transform(
        &self,
        event_type: &EventType,
        raw: &Value,
    ) -> Result<Value, TransformError> {
        let transformer = {
            let transformers = self.transformers.read().await;
            transformers.get(event_type.domain()).cloned()
        };
        match transformer {
            Some(transformer) => transformer.transform(event_type, raw),
            None => Ok(raw.clone()),
        }
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_default_transformers()
    }
}

/// Reads a named f64 out of a payload object, tolerating integer JSON.
pub(crate) fn number_field(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

/// Reads a named string out of a payload object.
pub(crate) fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct UppercaseTransformer;

    impl EventTransformer for UppercaseTransformer {
        fn domain(&self) -> &'static str {
            "guild"
        }

        fn transform(
            &self,
            _event_type: &EventType,
            raw: &Value,
        ) -> Result<Value, TransformError> {
            let name = string_field(raw, "name").unwrap_or_default();
            Ok(json!({"name": name.to_uppercase()}))
        }
    }

    #[tokio::test]
    async fn test_unknown_domain_passes_through() {
        let registry = TransformerRegistry::with_default_transformers();
        let et = EventType::parse("analytics.session_length").unwrap();
        let raw = json!({"sessionSeconds": 1800, "playerId": "p-1"});
        let canonical = registry.transform(&et, &raw).await.unwrap();
        assert_eq!(canonical, raw);
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = TransformerRegistry::new();
        let et = EventType::parse("guild.created").unwrap();
        let raw = json!({"name": "night watch"});

        assert_eq!(registry.transform(&et, &raw).await.unwrap(), raw);

        registry.register(Arc::new(UppercaseTransformer)).await;
        let canonical = registry.transform(&et, &raw).await.unwrap();
        assert_eq!(canonical["name"], "NIGHT WATCH");

        assert!(registry.unregister("guild").await);
        assert_eq!(registry.transform(&et, &raw).await.unwrap(), raw);
    }
}
