//! Schema registry and structural payload validation.
//!
//! The registry maps an event-type string to a structural schema and checks
//! payloads field by field. Failures are returned as data, never thrown: a
//! [`ValidationResult`] carries one error per violated field, naming the
//! field's path and a human-readable reason.
//!
//! An event type with no registered schema passes with a warning. This is a
//! deliberate compatibility policy so that new event types never hard-fail
//! ingestion before a schema ships for them.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Structural type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

/// Constraints for a single payload field.
///
/// Field names may be dotted paths (`position.x`) to reach into nested
/// objects.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub required: bool,
    /// Inclusive numeric lower bound.
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    pub max: Option<f64>,
    /// Maximum string length in characters.
    pub max_length: Option<usize>,
    /// Closed set of allowed string values.
    pub allowed: Option<Vec<String>>,
}

impl FieldSpec {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            min: None,
            max: None,
            max_length: None,
            allowed: None,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(field_type)
        }
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(allowed.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// Structural schema for one event type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventSchema {
    fields: HashMap<String, FieldSpec>,
}

impl EventSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, spec: FieldSpec) -> Self {
        self.fields.insert(name.to_string(), spec);
        self
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Outcome of validating one payload.
///
/// `validated_data` is the payload after type coercion (numeric strings
/// parsed into numbers for numeric fields, `"true"`/`"false"` into booleans)
/// and is only present when validation passed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_data: Option<Value>,
}

impl ValidationResult {
    fn passed(validated_data: Value, warnings: Vec<String>) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings,
            validated_data: Some(validated_data),
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
            validated_data: None,
        }
    }
}

/// Aggregate counts for a batch validation call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Per-type validation counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

/// Running validation statistics for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub by_type: HashMap<String, TypeStats>,
}

/// Registry of structural schemas keyed by event type.
///
/// Read-heavy, rarely mutated: lookups take a read lock, schema mutations a
/// write lock. Statistics counters are the only side effect of validation.
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, EventSchema>>,
    stats: RwLock<ValidationStats>,
}

impl SchemaRegistry {
    /// Creates an empty registry with no schemas.
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            stats: RwLock::new(ValidationStats::default()),
        }
    }

    /// Creates a registry pre-loaded with the stock gameplay schemas.
    pub fn with_default_schemas() -> Self {
        let registry = Self::new();
        let mut schemas = HashMap::new();
        for (event_type, schema) in default_schemas() {
            schemas.insert(event_type.to_string(), schema);
        }
        *registry.schemas.try_write().expect("new registry is uncontended") = schemas;
        registry
    }

    pub async fn add_schema(&self, event_type: &str, schema: EventSchema) {
        let mut schemas = self.schemas.write().await;
        schemas.insert(event_type.to_string(), schema);
        debug!("📋 Registered schema for {}", event_type);
    }

    pub async fn remove_schema(&self, event_type: &str) -> bool {
        let mut schemas = self.schemas.write().await;
        schemas.remove(event_type).is_some()
    }

    pub async fn has_schema(&self, event_type: &str) -> bool {
        self.schemas.read().await.contains_key(event_type)
    }

    /// Validates a payload against the schema registered for `event_type`.
    ///
    /// Unknown event types pass with a warning naming the missing schema.
    pub async fn validate(&self, event_type: &str, payload: &Value) -> ValidationResult {
        let result = {
            let schemas = self.schemas.read().await;
            match schemas.get(event_type) {
                Some(schema) => check_schema(schema, payload),
                None => ValidationResult::passed(
                    payload.clone(),
                    vec![format!(
                        "no schema registered for '{event_type}'; accepted as-is"
                    )],
                ),
            }
        };

        let mut stats = self.stats.write().await;
        stats.total += 1;
        if result.is_valid {
            stats.passed += 1;
        } else {
            stats.failed += 1;
        }
        let per_type = stats.by_type.entry(event_type.to_string()).or_default();
        per_type.total += 1;
        if result.is_valid {
            per_type.passed += 1;
        } else {
            per_type.failed += 1;
        }
        result
    }

    /// Validates a list of `(event_type, payload)` pairs, returning per-item
    /// results plus aggregate counts.
    pub async fn validate_batch(
        &self,
        items: &[(String, Value)],
    ) -> (Vec<ValidationResult>, BatchSummary) {
        let mut results = Vec::with_capacity(items.len());
        let mut summary = BatchSummary {
            total: items.len(),
            ..BatchSummary::default()
        };
        for (event_type, payload) in items {
            let result = self.validate(event_type, payload).await;
            if result.is_valid {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            results.push(result);
        }
        (results, summary)
    }

    pub async fn stats(&self) -> ValidationStats {
        self.stats.read().await.clone()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_default_schemas()
    }
}

/// Runs every field spec against the payload, collecting one error per
/// violated field and coercing loosely typed values on the way.
fn check_schema(schema: &EventSchema, payload: &Value) -> ValidationResult {
    if !payload.is_object() {
        return ValidationResult::failed(vec![format!(
            "$: expected object payload, got {}",
            json_type_name(payload)
        )]);
    }

    let mut errors = Vec::new();
    let mut validated = payload.clone();

    for (path, spec) in &schema.fields {
        match lookup_path(payload, path) {
            None => {
                if spec.required {
                    errors.push(format!("{path}: required field is missing"));
                }
            }
            Some(value) => match coerce(value, spec.field_type) {
                None => errors.push(format!(
                    "{path}: expected {}, got {}",
                    spec.field_type.describe(),
                    json_type_name(value)
                )),
                Some(coerced) => {
                    check_constraints(path, &coerced, spec, &mut errors);
                    if coerced != *value {
                        set_path(&mut validated, path, coerced);
                    }
                }
            },
        }
    }

    if errors.is_empty() {
        ValidationResult::passed(validated, Vec::new())
    } else {
        errors.sort();
        ValidationResult::failed(errors)
    }
}

fn check_constraints(path: &str, value: &Value, spec: &FieldSpec, errors: &mut Vec<String>) {
    if let Some(n) = value.as_f64() {
        if let Some(min) = spec.min {
            if n < min {
                errors.push(format!("{path}: {n} is below minimum {min}"));
            }
        }
        if let Some(max) = spec.max {
            if n > max {
                errors.push(format!("{path}: {n} is above maximum {max}"));
            }
        }
    }
    if let Some(s) = value.as_str() {
        if let Some(max_length) = spec.max_length {
            if s.chars().count() > max_length {
                errors.push(format!(
                    "{path}: length {} exceeds maximum {max_length}",
                    s.chars().count()
                ));
            }
        }
        if let Some(allowed) = &spec.allowed {
            if !allowed.iter().any(|a| a == s) {
                errors.push(format!(
                    "{path}: '{s}' is not one of [{}]",
                    allowed.join(", ")
                ));
            }
        }
    }
}

/// Attempts to view `value` as `target`, applying the documented coercions.
/// Returns the (possibly rewritten) value, or None on a type mismatch.
fn coerce(value: &Value, target: FieldType) -> Option<Value> {
    match target {
        FieldType::String => value.is_string().then(|| value.clone()),
        FieldType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        FieldType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Value::from(f as i64)),
            Value::String(s) => s.parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        FieldType::Object => value.is_object().then(|| value.clone()),
        FieldType::Array => value.is_array().then(|| value.clone()),
    }
}

fn lookup_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn set_path(payload: &mut Value, path: &str, new_value: Value) {
    let mut current = payload;
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(slot) = current.get_mut(segments[segments.len() - 1]) {
        *slot = new_value;
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The stock schemas for the six gameplay domains.
fn default_schemas() -> Vec<(&'static str, EventSchema)> {
    vec![
        (
            "player.moved",
            EventSchema::new()
                .field("playerId", FieldSpec::required(FieldType::String))
                .field("fromX", FieldSpec::required(FieldType::Number))
                .field("fromY", FieldSpec::required(FieldType::Number))
                .field("fromZ", FieldSpec::required(FieldType::Number))
                .field("toX", FieldSpec::required(FieldType::Number))
                .field("toY", FieldSpec::required(FieldType::Number))
                .field("toZ", FieldSpec::required(FieldType::Number))
                .field("speed", FieldSpec::optional(FieldType::Number).min(0.0))
                .field("regionId", FieldSpec::optional(FieldType::String))
                .field("toRegionId", FieldSpec::optional(FieldType::String)),
        ),
        (
            "player.combat",
            EventSchema::new()
                .field("attackerId", FieldSpec::required(FieldType::String))
                .field("targetId", FieldSpec::required(FieldType::String))
                .field(
                    "action",
                    FieldSpec::required(FieldType::String)
                        .one_of(&["attack", "defend", "cast", "ability"]),
                )
                .field("damage", FieldSpec::optional(FieldType::Number).min(0.0))
                .field("hit", FieldSpec::optional(FieldType::Boolean))
                .field("regionId", FieldSpec::optional(FieldType::String)),
        ),
        (
            "combat.resolved",
            EventSchema::new()
                .field("attackerId", FieldSpec::required(FieldType::String))
                .field("targetId", FieldSpec::required(FieldType::String))
                .field("action", FieldSpec::required(FieldType::String))
                .field("damage", FieldSpec::optional(FieldType::Number).min(0.0))
                .field("hit", FieldSpec::optional(FieldType::Boolean))
                .field("regionId", FieldSpec::optional(FieldType::String)),
        ),
        (
            "chat.message",
            EventSchema::new()
                .field("playerId", FieldSpec::required(FieldType::String))
                .field(
                    "message",
                    FieldSpec::required(FieldType::String).max_length(500),
                )
                .field(
                    "channel",
                    FieldSpec::optional(FieldType::String)
                        .one_of(&["global", "region", "party", "guild", "whisper"]),
                ),
        ),
        (
            "world.region_status_changed",
            EventSchema::new()
                .field("regionId", FieldSpec::required(FieldType::String))
                .field(
                    "status",
                    FieldSpec::required(FieldType::String)
                        .one_of(&["online", "offline", "degraded", "maintenance"]),
                )
                .field("previousStatus", FieldSpec::optional(FieldType::String)),
        ),
        (
            "world.event_started",
            EventSchema::new()
                .field("name", FieldSpec::required(FieldType::String))
                .field("global", FieldSpec::optional(FieldType::Boolean))
                .field("affectedRegions", FieldSpec::optional(FieldType::Array))
                .field(
                    "durationSeconds",
                    FieldSpec::optional(FieldType::Integer).range(1.0, 86_400.0),
                ),
        ),
        (
            "system.heartbeat",
            EventSchema::new()
                .field("instanceId", FieldSpec::required(FieldType::String))
                .field("uptimeSeconds", FieldSpec::optional(FieldType::Number).min(0.0)),
        ),
    ]
}
