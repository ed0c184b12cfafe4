//! Queue listener binary
//!
//! Usage: `queue-listener [config.toml]`. Without a path the configuration is
//! read from `GATEWAY_*` environment variables.

use anyhow::Context;
use listener_service::{ForwardingHandler, ListenerConfig, LoggedChannel, QueueListener, RelayService};
use op_log::OperationLog;
use queue_gateway::{transport, CorrelationGateway, GatewayConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Queue listener starting...");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => GatewayConfig::from_env().context("loading configuration from environment")?,
    };
    let listener_config = ListenerConfig::from_gateway(&config)?;

    let transport = transport::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.broker_url))?;

    let gateway = CorrelationGateway::new(Arc::clone(&transport), config);
    let channel = LoggedChannel::new(gateway, OperationLog::new("CorrelationGateway"));
    let service = RelayService::with_log(Arc::new(channel), OperationLog::new("RelayService"));
    let handler = Arc::new(ForwardingHandler::new(service));

    let listener = QueueListener::new(transport, handler, listener_config).start();
    info!("✅ Queue listener initialized");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("Shutting down...");
    listener.shutdown().await;

    Ok(())
}
