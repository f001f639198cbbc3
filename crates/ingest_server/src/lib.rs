//! # Ingest Server
//!
//! HTTP ingestion surface for the Meridian event pipeline. The server is
//! pure infrastructure: it parses and answers HTTP, and delegates every
//! decision about an event to the pipeline crate.
//!
//! ## Endpoints
//!
//! * `POST /events/ingest` - validate, transform and enqueue one event
//! * `POST /events/bulk` - up to 1000 events per call, per-item outcomes
//! * `POST /events/republish` - publish a payload straight onto the bus
//! * `GET /status` - queue, bus and progress snapshot with instance tags
//! * `GET /health` - liveness plus per-queue counters
//!
//! ## Shutdown ordering
//!
//! The binary stops the HTTP task first, then calls
//! [`meridian_event_pipeline::EventPipeline::shutdown`] so in-flight jobs
//! finish draining before the bus is torn down.

pub use config::ServerConfig;
pub use error::ServerError;
pub use routes::{build_router, AppState, MAX_BULK_EVENTS};
pub use server::{build_pipeline, IngestServer};

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
