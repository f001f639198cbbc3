//! The pipeline facade: validate → transform → enqueue, plus lifecycle.
//!
//! Every component is constructed explicitly and injected; nothing in the
//! crate reaches for global state, so tests (and embedders) can run fully
//! isolated pipeline instances side by side.

use crate::bus::{BroadcastBus, BusStatus};
use crate::error::PipelineError;
use crate::queue::{
    JobMetadata, JobStore, LastProcessed, ProcessorRegistry, QueueRouter, QueueStats,
};
use crate::transform::TransformerRegistry;
use crate::types::{EventEnvelope, EventType};
use crate::validator::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A raw event submission from a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub event_type: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Per-item outcome of a bulk submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a bulk submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItemOutcome>,
}

/// Snapshot of pipeline health for the status surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub status: String,
    pub queues: HashMap<String, QueueStats>,
    pub event_bus: BusStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<LastProcessed>,
}

/// The event pipeline.
///
/// Owns the validator, transformer registry, queue router (and through it the
/// job store), processor registry and broadcast bus. [`EventPipeline::start`]
/// spawns the worker pools; [`EventPipeline::shutdown`] stops them and tears
/// the bus down.
pub struct EventPipeline {
    validator: Arc<SchemaRegistry>,
    transformers: Arc<TransformerRegistry>,
    router: Arc<QueueRouter>,
    processors: Arc<ProcessorRegistry>,
    bus: Arc<BroadcastBus>,
    source: String,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl EventPipeline {
    /// Creates a pipeline with the stock schemas, transformers, queues and
    /// processors. `source` tags every bus message this instance publishes.
    pub fn new(source: &str) -> Self {
        let store = Arc::new(JobStore::new());
        Self::with_components(
            source,
            Arc::new(SchemaRegistry::with_default_schemas()),
            Arc::new(TransformerRegistry::with_default_transformers()),
            Arc::new(QueueRouter::new(store)),
            Arc::new(ProcessorRegistry::with_default_processors()),
            Arc::new(BroadcastBus::new(source)),
        )
    }

    /// Fully injected constructor for embedders and tests.
    pub fn with_components(
        source: &str,
        validator: Arc<SchemaRegistry>,
        transformers: Arc<TransformerRegistry>,
        router: Arc<QueueRouter>,
        processors: Arc<ProcessorRegistry>,
        bus: Arc<BroadcastBus>,
    ) -> Self {
        Self {
            validator,
            transformers,
            router,
            processors,
            bus,
            source: source.to_string(),
            workers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Spawns the per-queue worker pools. Idempotent.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let handles = self
            .router
            .spawn_workers(Arc::clone(&self.processors), Arc::clone(&self.bus));
        info!("🚀 Pipeline started with {} workers", handles.len());
        if let Ok(mut workers) = self.workers.lock() {
            workers.extend(handles);
        }
    }

    /// Stops the queues, waits for workers to exit and tears down the bus.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.router.stop();
        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }
        self.bus.shutdown().await;
        info!("🛑 Pipeline shut down");
    }

    /// Runs one event through validate → transform → enqueue.
    ///
    /// Returns the assembled envelope on success; its `id` is the event id
    /// producers correlate on. Validation failures come back as
    /// [`PipelineError::Validation`] with per-field messages.
    pub async fn ingest(&self, request: IngestRequest) -> Result<EventEnvelope, PipelineError> {
        let event_type = EventType::parse(request.event_type)?;

        let validation = self
            .validator
            .validate(event_type.as_str(), &request.data)
            .await;
        for warning in &validation.warnings {
            debug!("⚠️ {}", warning);
        }
        if !validation.is_valid {
            return Err(PipelineError::Validation {
                event_type: event_type.to_string(),
                errors: validation.errors,
            });
        }
        let validated = validation.validated_data.unwrap_or(request.data);

        let envelope = EventEnvelope::assemble(event_type.clone(), validated);

        let canonical = self
            .transformers
            .transform(&event_type, &envelope.data)
            .await
            .map_err(|e| {
                let snapshot: String = envelope.data.to_string().chars().take(256).collect();
                error!("❌ Transform failed for {}: {} (payload: {})", event_type, e, snapshot);
                PipelineError::Transform(e)
            })?;

        let source = request
            .metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(Value::as_str)
            .unwrap_or(&self.source);

        let job_id = self
            .router
            .enqueue(event_type, canonical, JobMetadata::new(source))
            .await?;
        debug!("📥 Event {} enqueued as job {}", envelope.id, job_id);
        Ok(envelope)
    }

    /// Ingests a batch, one outcome per item. Failures do not stop the rest;
    /// the size cap is the caller's to enforce.
    pub async fn ingest_batch(&self, requests: Vec<IngestRequest>) -> BatchOutcome {
        let mut results = Vec::with_capacity(requests.len());
        let mut successful = 0;
        for request in requests {
            match self.ingest(request).await {
                Ok(envelope) => {
                    successful += 1;
                    results.push(BatchItemOutcome {
                        success: true,
                        event_id: Some(envelope.id),
                        error: None,
                    });
                }
                Err(e) => results.push(BatchItemOutcome {
                    success: false,
                    event_id: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        BatchOutcome {
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    /// Publishes a payload directly on an event channel, bypassing the
    /// queues. Derived routing still applies.
    pub async fn republish(&self, event_type: &str, data: Value) -> Result<(), PipelineError> {
        self.bus.publish(event_type, data).await?;
        Ok(())
    }

    /// Aggregated queue, bus and progress snapshot.
    pub async fn status(&self) -> PipelineStatus {
        let status = if self.running.load(Ordering::SeqCst) {
            "running"
        } else {
            "stopped"
        };
        PipelineStatus {
            status: status.to_string(),
            queues: self.router.stats().await,
            event_bus: self.bus.status().await,
            last_processed: self.router.store().last_processed(),
        }
    }

    pub fn validator(&self) -> &Arc<SchemaRegistry> {
        &self.validator
    }

    pub fn transformers(&self) -> &Arc<TransformerRegistry> {
        &self.transformers
    }

    pub fn router(&self) -> &Arc<QueueRouter> {
        &self.router
    }

    pub fn bus(&self) -> &Arc<BroadcastBus> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
