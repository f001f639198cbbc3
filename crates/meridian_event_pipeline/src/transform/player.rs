//! Canonicalization of `player.*` events.

use super::{number_field, string_field, EventTransformer};
use crate::error::TransformError;
use crate::types::EventType;
use serde_json::{json, Value};

/// Movement farther than this in one step is a teleport and is not accepted
/// as organic movement unless the payload says so explicitly.
const TELEPORT_THRESHOLD: f64 = 200.0;

/// Transformer for the `player` domain.
///
/// `player.moved` is reshaped into the canonical movement form; other player
/// actions (login, logout, combat initiations routed through the player
/// domain) pass through untouched, since their consumers read the raw shape.
pub struct PlayerTransformer;

impl EventTransformer for PlayerTransformer {
    fn domain(&self) -> &'static str {
        "player"
    }

    fn transform(&self, event_type: &EventType, raw: &Value) -> Result<Value, TransformError> {
        match event_type.action() {
            "moved" => canonicalize_movement(event_type, raw),
            _ => Ok(raw.clone()),
        }
    }
}

/// Buckets a step distance into the coarse movement classes used by
/// anti-cheat heuristics and region hand-off decisions.
fn classify_movement(distance: f64) -> &'static str {
    if distance < 1.0 {
        "micro"
    } else if distance < 10.0 {
        "walking"
    } else if distance < 50.0 {
        "running"
    } else if distance < 200.0 {
        "mount"
    } else {
        "teleport"
    }
}

fn canonicalize_movement(event_type: &EventType, raw: &Value) -> Result<Value, TransformError> {
    let coord = |key: &str| -> Result<f64, TransformError> {
        number_field(raw, key).ok_or_else(|| {
            TransformError::new(
                "player",
                event_type.as_str(),
                format!("missing or non-finite coordinate '{key}'"),
            )
        })
    };

    let from = (coord("fromX")?, coord("fromY")?, coord("fromZ")?);
    let to = (coord("toX")?, coord("toY")?, coord("toZ")?);

    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let dz = to.2 - from.2;
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();

    let speed = number_field(raw, "speed").unwrap_or(distance);
    let region_id = string_field(raw, "regionId");
    let to_region_id = string_field(raw, "toRegionId");
    let region_change = match (&region_id, &to_region_id) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    let movement_type = classify_movement(distance);
    let teleport_allowed = raw.get("teleport").and_then(Value::as_bool).unwrap_or(false);
    let is_valid_movement = distance <= TELEPORT_THRESHOLD || teleport_allowed;

    let mut canonical = json!({
        "movement": {
            "from": {"x": from.0, "y": from.1, "z": from.2},
            "to": {"x": to.0, "y": to.1, "z": to.2},
            "distance": distance,
            "speed": speed,
            "regionChange": region_change,
        },
        "metadata": {
            "isValidMovement": is_valid_movement,
            "movementType": movement_type,
        },
    });

    if let Some(player_id) = string_field(raw, "playerId") {
        canonical["playerId"] = json!(player_id);
    }
    if let Some(region_id) = region_id {
        canonical["regionId"] = json!(region_id);
    }
    if let Some(to_region_id) = to_region_id {
        canonical["toRegionId"] = json!(to_region_id);
    }

    Ok(canonical)
}
