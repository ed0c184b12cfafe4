//! Messaging channel used by services, with an explicit logging wrapper

use async_trait::async_trait;
use op_log::OperationLog;
use queue_gateway::{CorrelationGateway, Message, OutboundMessage, Payload, Result};
use std::fmt;
use tracing::Level;

/// Send and request/response operations a service depends on
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Fire-and-forget text send to the write destination
    async fn send_text(&self, text: &str) -> Result<Message>;

    /// Text request/response round trip
    async fn send_and_receive(&self, text: &str) -> Result<Option<String>>;

    /// Request/response round trip with a caller-built message
    async fn send_and_receive_message(&self, message: OutboundMessage) -> Result<Option<String>>;
}

#[async_trait]
impl MessageChannel for CorrelationGateway {
    async fn send_text(&self, text: &str) -> Result<Message> {
        CorrelationGateway::send_text(self, text).await
    }

    async fn send_and_receive(&self, text: &str) -> Result<Option<String>> {
        CorrelationGateway::send_and_receive(self, text).await
    }

    async fn send_and_receive_message(&self, message: OutboundMessage) -> Result<Option<String>> {
        CorrelationGateway::send_and_receive_message(self, message).await
    }
}

/// Channel decorated with entry/exit/failure logging
#[derive(Debug)]
pub struct LoggedChannel<C> {
    inner: C,
    log: OperationLog,
}

impl<C: MessageChannel> LoggedChannel<C> {
    /// Wrap `inner`, logging under `log`'s receiver name
    pub fn new(inner: C, log: OperationLog) -> Self {
        Self { inner, log }
    }

    /// Wrapped channel
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: MessageChannel> MessageChannel for LoggedChannel<C> {
    async fn send_text(&self, text: &str) -> Result<Message> {
        self.log
            .invoke("send_text", &[&text], self.inner.send_text(text))
            .await
    }

    async fn send_and_receive(&self, text: &str) -> Result<Option<String>> {
        self.log
            .invoke("send_and_receive", &[&text], self.inner.send_and_receive(text))
            .await
    }

    async fn send_and_receive_message(&self, message: OutboundMessage) -> Result<Option<String>> {
        let args = MessageArg::of(&message);
        self.log
            .invoke(
                "send_and_receive_message",
                &[&args],
                self.inner.send_and_receive_message(message),
            )
            .await
    }
}

/// Outbound message as a logged argument. The body is only copied when
/// DEBUG is on; otherwise its length stands in for it.
enum MessageArg {
    Full(OutboundMessage),
    Shape {
        correlation_id: Option<String>,
        headers: usize,
        payload_len: usize,
    },
}

impl MessageArg {
    fn of(message: &OutboundMessage) -> Self {
        if tracing::enabled!(Level::DEBUG) {
            return MessageArg::Full(message.clone());
        }

        let payload_len = match &message.payload {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        };
        MessageArg::Shape {
            correlation_id: message.correlation_id.clone(),
            headers: message.headers.len(),
            payload_len,
        }
    }
}

impl fmt::Debug for MessageArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageArg::Full(message) => fmt::Debug::fmt(message, f),
            MessageArg::Shape {
                correlation_id,
                headers,
                payload_len,
            } => f
                .debug_struct("OutboundMessage")
                .field("correlation_id", correlation_id)
                .field("headers", headers)
                .field("payload_len", payload_len)
                .finish(),
        }
    }
}
