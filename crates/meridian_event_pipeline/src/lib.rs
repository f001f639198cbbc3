//! # Meridian Event Pipeline
//!
//! An event-processing backbone for multiplayer game backends. Producers
//! submit raw gameplay events (player actions, world state changes, combat,
//! chat); the pipeline validates them against per-type schemas, normalizes
//! them into canonical per-domain shapes, routes them through priority-ordered
//! queues with bounded worker concurrency and retry/backoff, and re-publishes
//! the processed results on a channel-addressed broadcast bus for downstream
//! consumers.
//!
//! ## Core Components
//!
//! - [`SchemaRegistry`] - structural payload validation with pass/fail stats
//! - [`TransformerRegistry`] - per-domain canonicalization of raw payloads
//! - [`QueueRouter`] - domain-to-queue routing, priority scoring, durable jobs
//! - [`BroadcastBus`] - exact and wildcard channel pub/sub with derived routing
//! - [`EventPipeline`] - the facade wiring all of the above together
//!
//! ## Delivery Guarantees
//!
//! Queue delivery is at-least-once: a job survives processor failures up to
//! its queue's retry cap and may therefore execute more than once. Bus
//! delivery is best-effort: subscribers registered before a publish see the
//! message, late subscribers do not, and nothing is replayed.
//!
//! ## Quick Start
//!
//! ```rust
//! use meridian_event_pipeline::{create_event_pipeline, IngestRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = create_event_pipeline("example-instance");
//!     pipeline.start();
//!
//!     let envelope = pipeline.ingest(IngestRequest {
//!         event_type: "chat.message".to_string(),
//!         data: serde_json::json!({
//!             "playerId": "p-1",
//!             "message": "hello world",
//!         }),
//!         metadata: None,
//!     }).await?;
//!
//!     println!("accepted event {}", envelope.id);
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod transform;
pub mod types;
pub mod utils;
pub mod validator;

pub use bus::{BroadcastBus, BusMessage, BusStatus, ChannelHandler, RemoteTransport};
pub use error::{BusError, PipelineError, ProcessError, QueueError, TransformError};
pub use pipeline::{EventPipeline, IngestRequest, PipelineStatus};
pub use queue::{
    default_queue_configs, queue_for_domain, EventQueue, Job, JobMetadata, JobProcessor,
    JobState, JobStore, LastProcessed, PriorityTable, ProcessorRegistry, QueueConfig,
    QueueRouter, QueueStats, RetryPolicy, FALLBACK_QUEUE,
};
pub use transform::{EventTransformer, TransformerRegistry};
pub use types::{EventEnvelope, EventType};
pub use utils::{create_event_pipeline, current_timestamp_ms};
pub use validator::{
    EventSchema, FieldSpec, FieldType, SchemaRegistry, ValidationResult, ValidationStats,
};
