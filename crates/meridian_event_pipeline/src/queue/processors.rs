//! Domain processors executed by queue workers.
//!
//! Every domain maps to one processor through an explicit registry populated
//! at startup; unknown domains fall back to the designated default processor
//! rather than failing lookup. Processors receive the canonical data a
//! transformer produced and return the result that gets published on
//! `processed.<eventType>`.

use super::job::Job;
use crate::error::ProcessError;
use crate::utils::current_timestamp_ms;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Asynchronous handler for one domain's jobs.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// The domain this processor claims, e.g. `"combat"`.
    fn domain(&self) -> &'static str;

    /// Processes one job. An error triggers the queue's retry policy.
    async fn process(&self, job: &Job) -> Result<Value, ProcessError>;
}

/// Registry mapping domains to processors, with a fallback for the rest.
///
/// Populated before worker start-up and shared immutably afterwards.
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn JobProcessor>>,
    fallback: Arc<dyn JobProcessor>,
}

impl ProcessorRegistry {
    /// Creates an empty registry where every domain hits the default
    /// processor.
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: Arc::new(DefaultProcessor),
        }
    }

    /// Creates a registry with the six stock gameplay processors.
    pub fn with_default_processors() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlayerProcessor));
        registry.register(Arc::new(WorldProcessor));
        registry.register(Arc::new(CombatProcessor));
        registry.register(Arc::new(ChatProcessor));
        registry.register(Arc::new(SystemProcessor));
        registry.register(Arc::new(AnalyticsProcessor));
        registry
    }

    pub fn register(&mut self, processor: Arc<dyn JobProcessor>) {
        self.processors
            .insert(processor.domain().to_string(), processor);
    }

    pub fn for_domain(&self, domain: &str) -> Arc<dyn JobProcessor> {
        self.processors
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_default_processors()
    }
}

/// Fallback for domains nothing claimed: acknowledge and echo.
pub struct DefaultProcessor;

#[async_trait]
impl JobProcessor for DefaultProcessor {
    fn domain(&self) -> &'static str {
        "default"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        Ok(json!({
            "eventType": job.event_type.to_string(),
            "passthrough": true,
            "data": job.canonical_data,
            "timestamp": current_timestamp_ms(),
        }))
    }
}

/// Player domain: movement acceptance and position records.
pub struct PlayerProcessor;

#[async_trait]
impl JobProcessor for PlayerProcessor {
    fn domain(&self) -> &'static str {
        "player"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        let data = &job.canonical_data;
        if job.event_type.action() == "moved" {
            let movement = data
                .get("movement")
                .ok_or_else(|| ProcessError::new("canonical movement data missing"))?;
            let accepted = data
                .pointer("/metadata/isValidMovement")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let mut result = json!({
                "playerId": data.get("playerId").cloned().unwrap_or(Value::Null),
                "position": movement.get("to").cloned().unwrap_or(Value::Null),
                "movementType": data.pointer("/metadata/movementType").cloned().unwrap_or(Value::Null),
                "distance": movement.get("distance").cloned().unwrap_or(Value::Null),
                "accepted": accepted,
                "timestamp": current_timestamp_ms(),
            });
            if let Some(region_id) = data.get("regionId") {
                result["regionId"] = region_id.clone();
            }
            return Ok(result);
        }

        Ok(json!({
            "playerId": data.get("playerId").cloned().unwrap_or(Value::Null),
            "action": job.event_type.action(),
            "acknowledged": true,
            "timestamp": current_timestamp_ms(),
        }))
    }
}

/// Combat domain: resolves the canonical exchange into an outcome record.
pub struct CombatProcessor;

#[async_trait]
impl JobProcessor for CombatProcessor {
    fn domain(&self) -> &'static str {
        "combat"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        let data = &job.canonical_data;
        let attacker = data
            .pointer("/attacker/id")
            .ok_or_else(|| ProcessError::new("canonical combat data missing attacker"))?;
        let target = data
            .pointer("/target/id")
            .ok_or_else(|| ProcessError::new("canonical combat data missing target"))?;
        let hit = data
            .pointer("/result/hit")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let damage = data
            .pointer("/result/damage")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut result = json!({
            "attacker": attacker,
            "target": target,
            "action": data.get("action").cloned().unwrap_or(Value::Null),
            "outcome": {
                "hit": hit,
                "damageDealt": if hit { damage } else { 0.0 },
            },
            "timestamp": current_timestamp_ms(),
        });
        if let Some(region_id) = data.get("regionId") {
            result["regionId"] = region_id.clone();
        }
        Ok(result)
    }
}

/// Chat domain: produces a delivery record with a moderation flag.
pub struct ChatProcessor;

#[async_trait]
impl JobProcessor for ChatProcessor {
    fn domain(&self) -> &'static str {
        "chat"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        let data = &job.canonical_data;
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| ProcessError::new("canonical chat data missing message"))?;

        // Empty after trimming means nothing to deliver.
        let flagged = message.is_empty();

        Ok(json!({
            "playerId": data.get("playerId").cloned().unwrap_or(Value::Null),
            "channel": data.get("channel").cloned().unwrap_or_else(|| json!("global")),
            "message": message,
            "mentions": data.get("mentions").cloned().unwrap_or_else(|| json!([])),
            "delivered": !flagged,
            "flagged": flagged,
            "timestamp": current_timestamp_ms(),
        }))
    }
}

/// World domain: applies region status changes and world event scoping.
pub struct WorldProcessor;

#[async_trait]
impl JobProcessor for WorldProcessor {
    fn domain(&self) -> &'static str {
        "world"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        let mut result = job.canonical_data.clone();
        if let Some(object) = result.as_object_mut() {
            object.insert("applied".to_string(), json!(true));
            object.insert("timestamp".to_string(), json!(current_timestamp_ms()));
        }
        Ok(result)
    }
}

/// System domain: acknowledgement records for infrastructure events.
pub struct SystemProcessor;

#[async_trait]
impl JobProcessor for SystemProcessor {
    fn domain(&self) -> &'static str {
        "system"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        Ok(json!({
            "eventType": job.event_type.to_string(),
            "acknowledged": true,
            "source": job.metadata.source,
            "timestamp": current_timestamp_ms(),
        }))
    }
}

/// Analytics domain: wraps the payload as a measurement for downstream sinks.
pub struct AnalyticsProcessor;

#[async_trait]
impl JobProcessor for AnalyticsProcessor {
    fn domain(&self) -> &'static str {
        "analytics"
    }

    async fn process(&self, job: &Job) -> Result<Value, ProcessError> {
        Ok(json!({
            "measurement": job.event_type.action(),
            "fields": job.canonical_data,
            "recordedAt": current_timestamp_ms(),
        }))
    }
}
