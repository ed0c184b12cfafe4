//! NATS JetStream transport adapter
//!
//! Each destination is a work-queue stream holding one subject of the same
//! name, and every message travels as a JSON envelope so correlation ids and
//! headers survive the trip. Streams keep messages until a consumer acks
//! them, so a reply published before anyone reads the destination is not
//! lost.
//!
//! All processes reading a destination share one durable pull consumer.
//! JetStream cannot evaluate selectors, so a pulled message that does not
//! match is nak'd with a short delay and becomes available to other readers
//! again.

use crate::{
    gateway::deadline_after,
    message::{Message, MessageId, OutboundMessage},
    selector::Selector,
    transport::{Transport, TransportError},
};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, PullConsumer},
    stream::{Config as StreamConfig, RetentionPolicy, StorageType},
    AckKind, Context as JetStreamContext,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, trace, warn};

/// Delay before a non-matching message is offered to readers again
const REDELIVERY_DELAY: Duration = Duration::from_millis(20);

/// Transport backed by NATS JetStream
pub struct NatsTransport {
    context: JetStreamContext,
    streams: Mutex<HashSet<String>>,
    consumers: Mutex<HashMap<String, Arc<PullConsumer>>>,
}

impl NatsTransport {
    /// Connect to a NATS server with JetStream enabled
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        info!("Connecting to NATS JetStream at {}", url);

        let client = async_nats::connect(url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        info!("✅ Connected to NATS");

        Ok(Self {
            context: jetstream::new(client),
            streams: Mutex::new(HashSet::new()),
            consumers: Mutex::new(HashMap::new()),
        })
    }

    /// Create the streams behind `destinations` so messages sent to them are
    /// retained before the first read
    pub async fn prepare<'a>(
        &self,
        destinations: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), TransportError> {
        for destination in destinations {
            self.ensure_stream(destination).await?;
        }
        Ok(())
    }

    async fn ensure_stream(&self, destination: &str) -> Result<(), TransportError> {
        let mut streams = self.streams.lock().await;
        if streams.contains(destination) {
            return Ok(());
        }

        let name = stream_name(destination);
        let config = StreamConfig {
            name: name.clone(),
            description: Some(format!("Courier destination {}", destination)),
            subjects: vec![destination.to_string()],
            retention: RetentionPolicy::WorkQueue,
            storage: StorageType::File,
            ..Default::default()
        };

        self.context
            .get_or_create_stream(config)
            .await
            .map_err(|e| TransportError::Connection(format!("stream {}: {}", name, e)))?;

        info!("Stream {} ready for {}", name, destination);
        streams.insert(destination.to_string());
        Ok(())
    }

    async fn consumer(&self, destination: &str) -> Result<Arc<PullConsumer>, TransportError> {
        let mut consumers = self.consumers.lock().await;
        if let Some(consumer) = consumers.get(destination) {
            return Ok(Arc::clone(consumer));
        }

        self.ensure_stream(destination).await?;

        let name = stream_name(destination);
        let stream = self
            .context
            .get_stream(&name)
            .await
            .map_err(|e| TransportError::Receive(format!("stream {}: {}", name, e)))?;

        let durable = consumer_name(destination);
        let consumer_config = pull::Config {
            durable_name: Some(durable.clone()),
            description: Some(format!("Courier readers of {}", destination)),
            ack_policy: AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer: PullConsumer = stream
            .get_or_create_consumer(&durable, consumer_config)
            .await
            .map_err(|e| TransportError::Receive(format!("consumer {}: {}", durable, e)))?;

        info!("Consumer {} attached to {}", durable, name);
        let consumer = Arc::new(consumer);
        consumers.insert(destination.to_string(), Arc::clone(&consumer));
        Ok(consumer)
    }
}

/// Pull at most one message, waiting up to `wait`
async fn pull_one(
    consumer: &PullConsumer,
    wait: Duration,
) -> Result<Option<jetstream::Message>, TransportError> {
    let batch = if wait.is_zero() {
        consumer.fetch().max_messages(1).messages().await
    } else {
        consumer
            .batch()
            .max_messages(1)
            .expires(wait)
            .messages()
            .await
    };

    let mut batch = batch.map_err(|e| TransportError::Receive(e.to_string()))?;
    batch
        .next()
        .await
        .transpose()
        .map_err(|e| TransportError::Receive(e.to_string()))
}

/// Stream names may not contain subject tokens or wildcards
pub(crate) fn stream_name(destination: &str) -> String {
    format!("COURIER_{}", sanitize(destination).to_uppercase())
}

fn consumer_name(destination: &str) -> String {
    format!("courier_{}", sanitize(destination))
}

fn sanitize(destination: &str) -> String {
    destination
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl Transport for NatsTransport {
    async fn send(
        &self,
        destination: &str,
        message: OutboundMessage,
    ) -> Result<Message, TransportError> {
        self.ensure_stream(destination).await?;

        let message = message.into_message(MessageId::generate(), destination);
        let payload = message.to_bytes()?;

        // Message id doubles as the deduplication key
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", message.id.as_str());

        self.context
            .publish_with_headers(destination.to_string(), headers, Bytes::from(payload))
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?
            .await
            .map_err(|e| TransportError::Publish(format!("Not acknowledged: {}", e)))?;

        Ok(message)
    }

    async fn receive_selected(
        &self,
        destination: &str,
        selector: &Selector,
        wait: Duration,
    ) -> Result<Option<Message>, TransportError> {
        let consumer = self.consumer(destination).await?;
        let deadline = deadline_after(wait);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(delivery) = pull_one(&consumer, remaining).await? else {
                return Ok(None);
            };

            match Message::from_bytes(&delivery.payload) {
                Ok(message) if selector.matches(&message) => {
                    delivery
                        .ack()
                        .await
                        .map_err(|e| TransportError::Receive(format!("ack failed: {}", e)))?;
                    return Ok(Some(message));
                }
                Ok(message) => {
                    trace!("{} does not match {}, releasing", message.id, selector);
                    delivery
                        .ack_with(AckKind::Nak(Some(REDELIVERY_DELAY)))
                        .await
                        .map_err(|e| TransportError::Receive(format!("nak failed: {}", e)))?;
                }
                Err(e) => {
                    warn!("Dropping undecodable message on {}: {}", destination, e);
                    delivery
                        .ack_with(AckKind::Term)
                        .await
                        .map_err(|e| TransportError::Receive(format!("term failed: {}", e)))?;
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}
