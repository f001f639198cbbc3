//! HTTP route handlers for the ingestion surface.
//!
//! All bodies are JSON. Producer-correctable failures (malformed event type,
//! schema violations, bulk limit breaches) map to 400; transform, enqueue and
//! publish failures map to 500. Ingestion callers always get a definitive
//! success or failure response - asynchronous processing failures are only
//! visible through `/status`.

use crate::config::InstanceSettings;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use meridian_event_pipeline::{EventPipeline, IngestRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

/// Hard cap on a single bulk submission.
pub const MAX_BULK_EVENTS: usize = 1000;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EventPipeline>,
    pub instance: InstanceSettings,
}

/// Builds the ingestion router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events/ingest", post(ingest_event))
        .route("/events/bulk", post(ingest_bulk))
        .route("/events/republish", post(republish_event))
        .route("/status", get(pipeline_status))
        .route("/health", get(health))
        .with_state(state)
}

async fn ingest_event(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> (StatusCode, Json<Value>) {
    match state.pipeline.ingest(request).await {
        Ok(envelope) => (
            StatusCode::OK,
            Json(json!({"success": true, "eventId": envelope.id})),
        ),
        Err(e) if e.is_client_fault() => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": e.to_string()})),
        ),
        Err(e) => {
            error!("❌ Ingest failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": e.to_string()})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    #[serde(default)]
    events: Option<Vec<IngestRequest>>,
}

async fn ingest_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> (StatusCode, Json<Value>) {
    let events = match request.events {
        Some(events) if !events.is_empty() => events,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "'events' array is required and must not be empty",
                })),
            )
        }
    };
    if events.len() > MAX_BULK_EVENTS {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!(
                    "bulk submissions are capped at {MAX_BULK_EVENTS} events, got {}",
                    events.len()
                ),
            })),
        );
    }

    let outcome = state.pipeline.ingest_batch(events).await;
    (
        StatusCode::OK,
        Json(serde_json::to_value(outcome).unwrap_or_default()),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepublishRequest {
    event_type: String,
    data: Value,
}

async fn republish_event(
    State(state): State<AppState>,
    Json(request): Json<RepublishRequest>,
) -> (StatusCode, Json<Value>) {
    match state
        .pipeline
        .republish(&request.event_type, request.data)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"success": true}))),
        Err(e) => {
            error!("❌ Republish of {} failed: {}", request.event_type, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": e.to_string()})),
            )
        }
    }
}

async fn pipeline_status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let status = state.pipeline.status().await;
    (
        StatusCode::OK,
        Json(json!({
            "pipeline": status,
            "instance": state.instance,
        })),
    )
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let status = state.pipeline.status().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "queues": status.queues,
        })),
    )
}
