//! Main application entry point for the Meridian event pipeline server.
//!
//! Provides CLI interface, configuration loading, and server startup with
//! a periodic health monitor over the pipeline's queue and bus statistics.

mod cli;
mod config;
mod signals;

use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use ingest_server::IngestServer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Logging Setup
// ============================================================================

/// Initialize logging system
fn setup_logging(config: &LoggingSettings, json_format: bool) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_target(false))
            .init();
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Application
// ============================================================================

/// Main application struct wiring configuration to the ingest server.
pub struct Application {
    config: AppConfig,
    server: IngestServer,
}

impl Application {
    /// Create a new application from CLI arguments.
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.listen_addr = bind_address;
        }
        if let Some(instance_id) = args.instance_id {
            config.instance.id = instance_id;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            anyhow::bail!("Configuration validation failed: {e}");
        }

        setup_logging(&config.logging, args.json_logs)?;

        let server = IngestServer::new(config.to_server_config());

        info!("🚀 Meridian Event Pipeline v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | Instance: {} ({}/{})",
            args.config_path.display(),
            config.instance.id,
            config.instance.region,
            config.instance.environment
        );

        Ok(Self { config, server })
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.listen_addr);
        info!("  🔌 Broker: {}", self.config.broker.address());
        info!(
            "  🔁 Retry: up to {} attempts, base delay {}ms",
            self.config.retry.max_attempts, self.config.retry.base_delay_ms
        );
        info!("  👂 Watch channels: {:?}", self.config.channels.watch);

        let pipeline = self.server.pipeline();

        // Serve in the background so this task can wait on signals.
        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("❌ Server error: {:?}", e);
                    std::process::exit(1);
                }
            })
        };

        // Periodic health monitor over queue and bus statistics.
        let monitoring_handle = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
                let mut last_published = 0u64;

                loop {
                    interval.tick().await;

                    let status = pipeline.status().await;
                    let published_this_period =
                        status.event_bus.published.saturating_sub(last_published);
                    last_published = status.event_bus.published;

                    let (waiting, failed): (u64, u64) = status
                        .queues
                        .values()
                        .fold((0, 0), |(w, f), q| (w + q.waiting, f + q.failed));

                    info!(
                        "📊 Health - {} published/min | {} waiting | {} failed | bus {}",
                        published_this_period,
                        waiting,
                        failed,
                        if status.event_bus.connected {
                            "connected"
                        } else {
                            "disconnected"
                        }
                    );
                }
            })
        };

        info!("✅ Meridian is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::setup_signal_handlers().await?;

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");

        monitoring_handle.abort();
        server_handle.abort();
        pipeline.shutdown().await;

        info!("👋 Goodbye");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}
