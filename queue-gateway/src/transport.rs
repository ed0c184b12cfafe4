//! Transport adapter seam
//!
//! The gateway only needs two primitives from a broker: a blocking send that
//! returns the message with its assigned id, and a single selective receive
//! bounded by a wait. Everything else (correlation, deadlines, collection)
//! lives in the gateway.

use crate::{
    config::GatewayConfig,
    memory::MemoryBroker,
    message::{Message, OutboundMessage},
    nats::NatsTransport,
    selector::Selector,
    Error, Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Failure raised by a transport adapter
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Receive/subscribe error
    #[error("Receive error: {0}")]
    Receive(String),

    /// Envelope could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport was shut down
    #[error("Transport closed")]
    Closed,
}

/// Queue transport used by the gateway
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message and return it stamped with the transport-assigned id
    async fn send(
        &self,
        destination: &str,
        message: OutboundMessage,
    ) -> std::result::Result<Message, TransportError>;

    /// One selective receive attempt, waiting at most `wait`
    async fn receive_selected(
        &self,
        destination: &str,
        selector: &Selector,
        wait: Duration,
    ) -> std::result::Result<Option<Message>, TransportError>;
}

/// Shared transport handle
pub type TransportPtr = Arc<dyn Transport>;

/// Open the transport named by the configured broker URL.
///
/// `memory://` gives a fresh in-process broker, `nats://` connects to NATS
/// JetStream and creates the streams for every configured destination.
pub async fn connect(config: &GatewayConfig) -> Result<TransportPtr> {
    let url = config.broker_url.as_str();

    if url.starts_with("memory://") {
        info!("Using in-process memory broker");
        Ok(Arc::new(MemoryBroker::new()))
    } else if url.starts_with("nats://") {
        let transport = NatsTransport::connect(url).await?;
        let destinations = [
            &config.write_destination,
            &config.read_destination,
            &config.listener_destination,
        ];
        transport
            .prepare(destinations.into_iter().filter_map(|d| d.as_deref()))
            .await?;
        Ok(Arc::new(transport))
    } else {
        Err(Error::Config(format!("Unsupported broker URL: {}", url)))
    }
}
