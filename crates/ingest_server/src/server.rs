//! Server lifecycle: pipeline construction, channel taps, HTTP serving.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::{build_router, AppState};
use meridian_event_pipeline::{
    default_queue_configs, BroadcastBus, EventPipeline, JobStore, PriorityTable,
    ProcessorRegistry, QueueRouter, RetryPolicy, SchemaRegistry, TransformerRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Builds a pipeline from server configuration.
///
/// The stock queue set is kept, with the configured base delay applied to
/// every retry policy and the configured attempt ceiling capping each queue's
/// own attempt count (never raising it). The instance id becomes the bus
/// source tag.
pub fn build_pipeline(config: &ServerConfig) -> Arc<EventPipeline> {
    let base_delay = Duration::from_millis(config.retry.base_delay_ms);
    let queue_configs = default_queue_configs()
        .into_iter()
        .map(|mut queue| {
            let attempts = queue.retry.max_attempts.min(config.retry.max_attempts);
            queue.retry = RetryPolicy::new(attempts, base_delay);
            queue
        })
        .collect();

    let store = Arc::new(JobStore::new());
    let router = QueueRouter::with_configs(store, queue_configs, PriorityTable::default());

    Arc::new(EventPipeline::with_components(
        &config.instance.id,
        Arc::new(SchemaRegistry::with_default_schemas()),
        Arc::new(TransformerRegistry::with_default_transformers()),
        Arc::new(router),
        Arc::new(ProcessorRegistry::with_default_processors()),
        Arc::new(BroadcastBus::new(&config.instance.id)),
    ))
}

/// The HTTP ingestion server.
///
/// Owns the pipeline and the axum listener. Starting the server starts the
/// pipeline workers; the caller owns shutdown ordering (stop serving, then
/// [`EventPipeline::shutdown`]).
pub struct IngestServer {
    config: ServerConfig,
    pipeline: Arc<EventPipeline>,
}

impl IngestServer {
    /// Creates a server and its pipeline from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let pipeline = build_pipeline(&config);
        Self { config, pipeline }
    }

    /// Creates a server around an externally constructed pipeline.
    pub fn with_pipeline(config: ServerConfig, pipeline: Arc<EventPipeline>) -> Self {
        Self { config, pipeline }
    }

    pub fn pipeline(&self) -> Arc<EventPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the pipeline workers and serves the ingestion API until the
    /// listener fails or the task is aborted.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.pipeline.start();
        self.attach_channel_taps().await;

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| ServerError::Network(format!("invalid listen address: {e}")))?;
        let listener = TcpListener::bind(addr).await?;

        info!("🌐 Ingest API listening on {}", addr);
        info!(
            "🔌 Broker target {} ({} environment)",
            self.config.broker.address(),
            self.config.instance.environment
        );

        let router = build_router(AppState {
            pipeline: Arc::clone(&self.pipeline),
            instance: self.config.instance.clone(),
        })
        .layer(TraceLayer::new_for_http());

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Network(e.to_string()))
    }

    /// Subscribes a debug tap to every configured watch channel so operators
    /// can trace traffic per environment without code changes.
    async fn attach_channel_taps(&self) {
        for channel in &self.config.channels.watch {
            let name = format!("tap:{channel}");
            self.pipeline
                .bus()
                .subscribe_fn(
                    channel,
                    &name,
                    |channel: &str, message: &meridian_event_pipeline::BusMessage| {
                        debug!("👂 {} <- {}", channel, message.source);
                        Ok(())
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_pipeline_applies_retry_overrides() {
        let mut config = ServerConfig::default();
        config.retry.max_attempts = 2;
        config.retry.base_delay_ms = 100;

        let pipeline = build_pipeline(&config);
        let queue = pipeline.router().queue("combat-events").unwrap();
        // Stock combat attempts (5) capped down to 2, base delay replaced.
        assert_eq!(queue.config().retry.max_attempts, 2);
        assert_eq!(queue.config().retry.base_delay, Duration::from_millis(100));

        // Caps never raise a queue's own attempt count.
        let chat = pipeline.router().queue("chat-events").unwrap();
        assert_eq!(chat.config().retry.max_attempts, 2);
    }

    #[tokio::test]
    async fn test_server_wires_instance_tag_as_source() {
        let mut config = ServerConfig::default();
        config.instance.id = "meridian-test-7".to_string();
        let server = IngestServer::new(config);
        assert_eq!(server.pipeline().bus().source(), "meridian-test-7");
    }

    #[tokio::test]
    async fn test_channel_taps_register() {
        let config = ServerConfig::default();
        let server = IngestServer::new(config);
        server.attach_channel_taps().await;

        let status = server.pipeline().bus().status().await;
        assert!(status
            .active_channels
            .contains(&"processed.*".to_string()));
    }
}
