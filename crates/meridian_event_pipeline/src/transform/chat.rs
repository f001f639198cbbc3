//! Canonicalization of `chat.*` events.

use super::{string_field, EventTransformer};
use crate::error::TransformError;
use crate::types::EventType;
use serde_json::{json, Value};

/// Hard cap applied after trimming; anything longer is truncated, not
/// rejected, because the schema already rejected oversized raw messages.
const MAX_MESSAGE_CHARS: usize = 500;

/// Transformer for the `chat` domain.
///
/// Trims and clamps the message, defaults the channel to `global`, and
/// extracts `@name` mentions so downstream delivery never re-parses text.
pub struct ChatTransformer;

impl EventTransformer for ChatTransformer {
    fn domain(&self) -> &'static str {
        "chat"
    }

    fn transform(&self, event_type: &EventType, raw: &Value) -> Result<Value, TransformError> {
        let message = string_field(raw, "message").ok_or_else(|| {
            TransformError::new("chat", event_type.as_str(), "missing 'message'")
        })?;

        let trimmed: String = message.trim().chars().take(MAX_MESSAGE_CHARS).collect();
        let mentions = extract_mentions(&trimmed);
        let channel = string_field(raw, "channel").unwrap_or_else(|| "global".to_string());

        let mut canonical = json!({
            "message": trimmed,
            "channel": channel,
            "mentions": mentions,
        });

        if let Some(player_id) = string_field(raw, "playerId") {
            canonical["playerId"] = json!(player_id);
        }
        if let Some(region_id) = string_field(raw, "regionId") {
            canonical["regionId"] = json!(region_id);
        }

        Ok(canonical)
    }
}

fn extract_mentions(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .filter_map(|word| {
            let name: String = word
                .strip_prefix('@')?
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}
