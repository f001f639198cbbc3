//! Core data model: event types and the event envelope.
//!
//! Every event moving through the pipeline is wrapped in an [`EventEnvelope`].
//! The envelope is owned by the pipeline for the duration of one request;
//! once a job is enqueued the queue backing store owns the canonical data.

use crate::error::PipelineError;
use crate::utils::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A validated event type of the form `<domain>.<action>`.
///
/// The domain (text before the dot) selects the transformer, the processing
/// queue and the base priority; the action identifies the concrete event.
/// The invariant is exactly one `.` with non-empty segments on both sides.
///
/// # Examples
///
/// ```rust
/// use meridian_event_pipeline::EventType;
///
/// let et = EventType::parse("player.moved").unwrap();
/// assert_eq!(et.domain(), "player");
/// assert_eq!(et.action(), "moved");
/// assert!(EventType::parse("no_separator").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    /// Parses and validates an event type string.
    pub fn parse(s: impl Into<String>) -> Result<Self, PipelineError> {
        let s = s.into();
        let mut parts = s.splitn(2, '.');
        match (parts.next(), parts.next()) {
            (Some(domain), Some(action))
                if !domain.is_empty() && !action.is_empty() && !action.contains('.') =>
            {
                Ok(Self(s))
            }
            _ => Err(PipelineError::InvalidEventType(s)),
        }
    }

    /// The leading segment, e.g. `player` for `player.moved`.
    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    /// The trailing segment, e.g. `moved` for `player.moved`.
    pub fn action(&self) -> &str {
        self.0.splitn(2, '.').nth(1).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventType {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<EventType> for String {
    fn from(et: EventType) -> Self {
        et.0
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical wrapper around every event in flight.
///
/// `id` and `trace_id` are assigned at ingestion if the producer did not
/// supply them in the payload, and are never overwritten when present.
/// `timestamp` (ms since epoch) defaults to ingestion time when absent or
/// non-finite. `player_id` and `region_id` are lifted out of the payload when
/// present so routing never has to dig into opaque data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    pub trace_id: Uuid,
    pub data: Value,
    pub timestamp: i64,
}

impl EventEnvelope {
    /// Builds an envelope for a freshly ingested event, honoring any ids the
    /// producer already stamped into the payload.
    pub fn assemble(event_type: EventType, data: Value) -> Self {
        let id = extract_uuid(&data, "id").unwrap_or_else(Uuid::new_v4);
        let trace_id = extract_uuid(&data, "traceId").unwrap_or_else(Uuid::new_v4);
        let timestamp = extract_timestamp(&data).unwrap_or_else(current_timestamp_ms);
        let player_id = extract_string(&data, "playerId");
        let region_id = extract_string(&data, "regionId");

        Self {
            id,
            event_type,
            player_id,
            region_id,
            trace_id,
            data,
            timestamp,
        }
    }
}

fn extract_uuid(data: &Value, key: &str) -> Option<Uuid> {
    data.get(key)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn extract_string(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn extract_timestamp(data: &Value) -> Option<i64> {
    let raw = data.get("timestamp")?.as_f64()?;
    if raw.is_finite() && raw >= 0.0 {
        Some(raw as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_parsing() {
        let et = EventType::parse("combat.attack").unwrap();
        assert_eq!(et.domain(), "combat");
        assert_eq!(et.action(), "attack");
        assert_eq!(et.as_str(), "combat.attack");
    }

    #[test]
    fn test_event_type_rejects_malformed() {
        assert!(EventType::parse("nodot").is_err());
        assert!(EventType::parse(".moved").is_err());
        assert!(EventType::parse("player.").is_err());
        assert!(EventType::parse("a.b.c").is_err());
        assert!(EventType::parse("").is_err());
    }

    #[test]
    fn test_event_type_serde_round_trip() {
        let et = EventType::parse("world.event_started").unwrap();
        let encoded = serde_json::to_string(&et).unwrap();
        assert_eq!(encoded, "\"world.event_started\"");
        let decoded: EventType = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, et);

        let bad: Result<EventType, _> = serde_json::from_str("\"not-an-event-type\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_envelope_assigns_missing_ids() {
        let et = EventType::parse("chat.message").unwrap();
        let envelope = EventEnvelope::assemble(et, json!({"message": "hi"}));
        assert!(!envelope.id.is_nil());
        assert!(!envelope.trace_id.is_nil());
        assert!(envelope.timestamp > 0);
        assert!(envelope.player_id.is_none());
    }

    #[test]
    fn test_envelope_preserves_producer_ids() {
        let id = Uuid::new_v4();
        let trace = Uuid::new_v4();
        let et = EventType::parse("player.moved").unwrap();
        let envelope = EventEnvelope::assemble(
            et,
            json!({
                "id": id.to_string(),
                "traceId": trace.to_string(),
                "playerId": "p-42",
                "regionId": "r-1",
                "timestamp": 1_700_000_000_000i64,
            }),
        );
        assert_eq!(envelope.id, id);
        assert_eq!(envelope.trace_id, trace);
        assert_eq!(envelope.player_id.as_deref(), Some("p-42"));
        assert_eq!(envelope.region_id.as_deref(), Some("r-1"));
        assert_eq!(envelope.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_envelope_defaults_non_finite_timestamp() {
        let et = EventType::parse("player.moved").unwrap();
        // A NaN cannot appear in JSON, but a negative epoch can.
        let envelope = EventEnvelope::assemble(et, json!({"timestamp": -5}));
        assert!(envelope.timestamp > 0);
    }
}
