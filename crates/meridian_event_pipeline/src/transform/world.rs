//! Canonicalization of `world.*` events.

use super::{string_field, EventTransformer};
use crate::error::TransformError;
use crate::types::EventType;
use serde_json::{json, Value};

/// Transformer for the `world` domain.
///
/// Region status changes and world events get an explicit scope so that
/// derived routing can fan them out without inspecting free-form payloads;
/// every other world action passes through.
pub struct WorldTransformer;

impl EventTransformer for WorldTransformer {
    fn domain(&self) -> &'static str {
        "world"
    }

    fn transform(&self, event_type: &EventType, raw: &Value) -> Result<Value, TransformError> {
        match event_type.action() {
            "region_status_changed" => canonicalize_region_status(event_type, raw),
            "event_started" => Ok(canonicalize_world_event(raw)),
            _ => Ok(raw.clone()),
        }
    }
}

fn canonicalize_region_status(
    event_type: &EventType,
    raw: &Value,
) -> Result<Value, TransformError> {
    let region_id = string_field(raw, "regionId").ok_or_else(|| {
        TransformError::new("world", event_type.as_str(), "missing 'regionId'")
    })?;
    let status = string_field(raw, "status").ok_or_else(|| {
        TransformError::new("world", event_type.as_str(), "missing 'status'")
    })?;

    let mut canonical = json!({
        "regionId": region_id,
        "status": status,
    });
    if let Some(previous) = string_field(raw, "previousStatus") {
        canonical["previousStatus"] = json!(previous);
    }
    Ok(canonical)
}

fn canonicalize_world_event(raw: &Value) -> Value {
    let name = string_field(raw, "name").unwrap_or_else(|| "unnamed".to_string());
    let global = raw.get("global").and_then(Value::as_bool).unwrap_or(false);
    let affected_regions: Vec<String> = raw
        .get("affectedRegions")
        .and_then(Value::as_array)
        .map(|regions| {
            regions
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // An event touching no named region is global by definition.
    let global = global || affected_regions.is_empty();

    json!({
        "name": name,
        "global": global,
        "affectedRegions": affected_regions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_status_canonical() {
        let et = EventType::parse("world.region_status_changed").unwrap();
        let raw = json!({"regionId": "r-1", "status": "degraded", "previousStatus": "online"});
        let canonical = WorldTransformer.transform(&et, &raw).unwrap();
        assert_eq!(canonical["regionId"], "r-1");
        assert_eq!(canonical["status"], "degraded");
        assert_eq!(canonical["previousStatus"], "online");
    }

    #[test]
    fn test_region_status_requires_fields() {
        let et = EventType::parse("world.region_status_changed").unwrap();
        assert!(WorldTransformer
            .transform(&et, &json!({"regionId": "r-1"}))
            .is_err());
    }

    #[test]
    fn test_world_event_scoping() {
        let et = EventType::parse("world.event_started").unwrap();

        let scoped = WorldTransformer
            .transform(
                &et,
                &json!({"name": "invasion", "affectedRegions": ["r-1", "r-2"]}),
            )
            .unwrap();
        assert_eq!(scoped["global"], false);
        assert_eq!(scoped["affectedRegions"], json!(["r-1", "r-2"]));

        let global = WorldTransformer
            .transform(&et, &json!({"name": "eclipse", "global": true}))
            .unwrap();
        assert_eq!(global["global"], true);

        // No regions named means everyone is affected.
        let implicit = WorldTransformer
            .transform(&et, &json!({"name": "patch_notes"}))
            .unwrap();
        assert_eq!(implicit["global"], true);
    }

    #[test]
    fn test_other_world_actions_pass_through() {
        let et = EventType::parse("world.weather_changed").unwrap();
        let raw = json!({"weather": "rain"});
        assert_eq!(WorldTransformer.transform(&et, &raw).unwrap(), raw);
    }
}
