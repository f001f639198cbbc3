//! Canonicalization of `combat.*` events.

use super::{number_field, string_field, EventTransformer};
use crate::error::TransformError;
use crate::types::EventType;
use serde_json::{json, Value};

/// Transformer for the `combat` domain.
///
/// Every combat event collapses into `{attacker, target, action, result}`.
/// `result.hit` defaults to true unless the producer explicitly said false;
/// `result.damage` is the override when one was supplied, otherwise the
/// nominal damage, otherwise zero.
pub struct CombatTransformer;

impl EventTransformer for CombatTransformer {
    fn domain(&self) -> &'static str {
        "combat"
    }

    fn transform(&self, event_type: &EventType, raw: &Value) -> Result<Value, TransformError> {
        let attacker_id = string_field(raw, "attackerId").ok_or_else(|| {
            TransformError::new("combat", event_type.as_str(), "missing 'attackerId'")
        })?;
        let target_id = string_field(raw, "targetId").ok_or_else(|| {
            TransformError::new("combat", event_type.as_str(), "missing 'targetId'")
        })?;

        let action =
            string_field(raw, "action").unwrap_or_else(|| event_type.action().to_string());
        let hit = raw.get("hit").and_then(Value::as_bool).unwrap_or(true);
        let nominal_damage = number_field(raw, "damage").unwrap_or(0.0);
        let damage = number_field(raw, "damageOverride").unwrap_or(nominal_damage);
        let critical = raw.get("critical").and_then(Value::as_bool).unwrap_or(false);

        let mut canonical = json!({
            "attacker": {"id": attacker_id},
            "target": {"id": target_id},
            "action": action,
            "result": {
                "hit": hit,
                // A miss deals nothing regardless of the nominal roll.
                "damage": if hit { damage } else { 0.0 },
                "critical": critical,
            },
        });

        if let Some(region_id) = string_field(raw, "regionId") {
            canonical["regionId"] = json!(region_id);
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> EventType {
        EventType::parse("combat.resolved").unwrap()
    }

    #[test]
    fn test_hit_defaults_true_and_damage_nominal() {
        let raw = json!({
            "attackerId": "p-1",
            "targetId": "npc-7",
            "action": "attack",
            "damage": 42.0,
        });
        let canonical = CombatTransformer.transform(&resolved(), &raw).unwrap();
        assert_eq!(canonical["result"]["hit"], true);
        assert_eq!(canonical["result"]["damage"], json!(42.0));
        assert_eq!(canonical["attacker"]["id"], "p-1");
        assert_eq!(canonical["target"]["id"], "npc-7");
    }

    #[test]
    fn test_damage_override_wins() {
        let raw = json!({
            "attackerId": "p-1",
            "targetId": "npc-7",
            "damage": 42.0,
            "damageOverride": 13.0,
        });
        let canonical = CombatTransformer.transform(&resolved(), &raw).unwrap();
        assert_eq!(canonical["result"]["damage"], json!(13.0));
    }

    #[test]
    fn test_explicit_miss_zeroes_damage() {
        let raw = json!({
            "attackerId": "p-1",
            "targetId": "npc-7",
            "damage": 42.0,
            "hit": false,
        });
        let canonical = CombatTransformer.transform(&resolved(), &raw).unwrap();
        assert_eq!(canonical["result"]["hit"], false);
        assert_eq!(canonical["result"]["damage"], json!(0.0));
    }

    #[test]
    fn test_action_falls_back_to_event_action() {
        let et = EventType::parse("combat.spell_cast").unwrap();
        let raw = json!({"attackerId": "p-1", "targetId": "p-2"});
        let canonical = CombatTransformer.transform(&et, &raw).unwrap();
        assert_eq!(canonical["action"], "spell_cast");
    }

    #[test]
    fn test_missing_participants_is_an_error() {
        let raw = json!({"targetId": "npc-7"});
        let err = CombatTransformer.transform(&resolved(), &raw).unwrap_err();
        assert!(err.to_string().contains("attackerId"));
    }
}
