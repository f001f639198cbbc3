//! End-to-end tests for the ingestion surface: real pipeline, real router,
//! requests driven through the axum service.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ingest_server::{build_pipeline, build_router, AppState, ServerConfig};
use meridian_event_pipeline::EventPipeline;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

fn test_app() -> (Router, Arc<EventPipeline>) {
    let config = ServerConfig::default();
    let pipeline = build_pipeline(&config);
    let router = build_router(AppState {
        pipeline: Arc::clone(&pipeline),
        instance: config.instance,
    });
    (router, pipeline)
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn movement_event() -> Value {
    json!({
        "eventType": "player.moved",
        "data": {
            "playerId": "p-1",
            "regionId": "r1",
            "fromX": 0.0, "fromY": 0.0, "fromZ": 0.0,
            "toX": 3.0, "toY": 4.0, "toZ": 0.0,
        },
    })
}

#[tokio::test]
async fn test_ingest_returns_event_id() {
    let (router, _pipeline) = test_app();
    let (status, body) = post_json(&router, "/events/ingest", movement_event()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let event_id = body["eventId"].as_str().unwrap();
    assert!(Uuid::parse_str(event_id).is_ok());
}

#[tokio::test]
async fn test_ingest_rejects_schema_violation() {
    let (router, _pipeline) = test_app();
    let (status, body) = post_json(
        &router,
        "/events/ingest",
        json!({"eventType": "player.moved", "data": {"playerId": "p-1"}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("validation failed"));
}

#[tokio::test]
async fn test_bulk_requires_events() {
    let (router, _pipeline) = test_app();

    let (status, body) = post_json(&router, "/events/bulk", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));

    let (status, _) = post_json(&router, "/events/bulk", json!({"events": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_enforces_thousand_item_cap() {
    let (router, _pipeline) = test_app();

    let oversized: Vec<Value> = (0..1001)
        .map(|i| json!({"eventType": "analytics.tick", "data": {"n": i}}))
        .collect();
    let (status, body) = post_json(&router, "/events/bulk", json!({"events": oversized})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1000"));

    let at_cap: Vec<Value> = (0..1000)
        .map(|i| json!({"eventType": "analytics.tick", "data": {"n": i}}))
        .collect();
    let (status, body) = post_json(&router, "/events/bulk", json!({"events": at_cap})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1000);
    assert_eq!(body["successful"], 1000);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn test_bulk_reports_mixed_outcomes() {
    let (router, _pipeline) = test_app();
    let events = json!({"events": [
        movement_event(),
        {"eventType": "player.moved", "data": {}},
        {"eventType": "bad-type", "data": {}},
    ]});
    let (status, body) = post_json(&router, "/events/bulk", events).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 3);
    assert_eq!(body["successful"], 1);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["results"][0]["success"], true);
    assert_eq!(body["results"][1]["success"], false);
}

#[tokio::test]
async fn test_republish_reaches_subscribers() {
    let (router, pipeline) = test_app();

    let seen = Arc::new(std::sync::Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    pipeline
        .bus()
        .subscribe_fn("chat.message", "sink", move |_, _| {
            *sink.lock().unwrap() += 1;
            Ok(())
        })
        .await;

    let (status, body) = post_json(
        &router,
        "/events/republish",
        json!({"eventType": "chat.message", "data": {"message": "again"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_status_and_health_surfaces() {
    let (router, _pipeline) = test_app();
    post_json(&router, "/events/ingest", movement_event()).await;

    let (status, body) = get_json(&router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pipeline"]["status"], "stopped");
    assert_eq!(body["pipeline"]["queues"]["player-events"]["waiting"], 1);
    assert_eq!(body["instance"]["environment"], "development");
    assert!(body["pipeline"]["eventBus"]["connected"].as_bool().unwrap());

    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["queues"]["combat-events"].is_object());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingested_event_is_processed_and_rebroadcast() {
    let (router, pipeline) = test_app();

    let regional = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&regional);
    pipeline
        .bus()
        .subscribe_fn("region.r1.movement", "region-sink", move |_, message| {
            sink.lock().unwrap().push(message.data.clone());
            Ok(())
        })
        .await;

    pipeline.start();
    let (status, _) = post_json(&router, "/events/ingest", movement_event()).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let (_, body) = get_json(&router, "/status").await;
    assert_eq!(body["pipeline"]["queues"]["player-events"]["completed"], 1);
    assert_eq!(
        body["pipeline"]["lastProcessed"]["eventType"],
        "player.moved"
    );

    let regional = regional.lock().unwrap();
    assert_eq!(regional.len(), 1);
    assert_eq!(regional[0]["playerId"], "p-1");

    pipeline.shutdown().await;
}
