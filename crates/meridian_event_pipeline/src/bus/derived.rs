//! Derived re-routing rules.
//!
//! Certain gameplay channels automatically fan out to narrower-scoped
//! channels so that region-scoped consumers never have to filter a firehose
//! of all events:
//!
//! - `player.moved` → `region.<regionId>.movement` (reduced payload)
//! - `player.combat` → `region.<regionId>.combat`
//! - `world.region_status_changed` → `region.<regionId>.status`
//! - `world.event_started` → `world.global_event` when global, otherwise one
//!   publish per affected region on `region.<regionId>.event`
//!
//! Derived publishes never trigger further derived routing; the rule table
//! only keys source event channels.

use super::BroadcastBus;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub(super) async fn apply(bus: &BroadcastBus, channel: &str, payload: &Value) {
    match channel {
        "player.moved" => {
            let Some(region_id) = region_id_of(payload) else {
                debug!("📤 player.moved without regionId; skipping region fan-out");
                return;
            };
            // Region consumers only need who went where, and when.
            let reduced = json!({
                "playerId": payload.get("playerId").cloned().unwrap_or(Value::Null),
                "position": payload.get("position").cloned().unwrap_or(Value::Null),
                "timestamp": payload.get("timestamp").cloned().unwrap_or(Value::Null),
            });
            publish_derived(bus, format!("region.{region_id}.movement"), reduced).await;
        }
        "player.combat" => {
            let Some(region_id) = region_id_of(payload) else {
                return;
            };
            publish_derived(bus, format!("region.{region_id}.combat"), payload.clone()).await;
        }
        "world.region_status_changed" => {
            let Some(region_id) = region_id_of(payload) else {
                warn!("⚠️ region_status_changed without regionId; nothing to route");
                return;
            };
            let reduced = json!({
                "regionId": region_id,
                "status": payload.get("status").cloned().unwrap_or(Value::Null),
                "timestamp": payload.get("timestamp").cloned().unwrap_or(Value::Null),
            });
            publish_derived(bus, format!("region.{region_id}.status"), reduced).await;
        }
        "world.event_started" => {
            let global = payload.get("global").and_then(Value::as_bool).unwrap_or(false);
            if global {
                publish_derived(bus, "world.global_event".to_string(), payload.clone()).await;
                return;
            }
            let regions: Vec<String> = payload
                .get("affectedRegions")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            for region_id in regions {
                publish_derived(bus, format!("region.{region_id}.event"), payload.clone()).await;
            }
        }
        _ => {}
    }
}

async fn publish_derived(bus: &BroadcastBus, channel: String, payload: Value) {
    debug!("🔀 Derived publish to {}", channel);
    if let Err(e) = bus.publish_inner(&channel, payload).await {
        warn!("⚠️ Derived publish to {} failed: {}", channel, e);
    }
}

fn region_id_of(payload: &Value) -> Option<&str> {
    payload.get("regionId").and_then(Value::as_str)
}
