//! Correlation gateway: synchronous request/response over a queue transport
//!
//! A request is sent to the write destination; its correlation key (explicit
//! correlation id, else the transport-assigned message id) becomes a
//! `CorrelationId = '<key>'` selector, and the read destination is polled
//! with that selector until a reply arrives or the deadline passes.
//!
//! The responder must echo the correlation key on its reply. No reply before
//! the deadline is `Ok(None)`, not an error.

use crate::{
    config::GatewayConfig,
    message::{Message, OutboundMessage},
    metrics::{
        GATEWAY_POLL_ATTEMPTS, GATEWAY_RECEIVE_TOTAL, GATEWAY_ROUND_TRIP_DURATION,
        GATEWAY_SEND_TOTAL,
    },
    selector::Selector,
    transport::TransportPtr,
    Error, Result,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

/// Request/response gateway over a shared transport
#[derive(Clone)]
pub struct CorrelationGateway {
    transport: TransportPtr,
    config: Arc<GatewayConfig>,
}

impl fmt::Debug for CorrelationGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CorrelationGateway {
    /// Create a gateway
    pub fn new(transport: TransportPtr, config: GatewayConfig) -> Self {
        info!(
            "Starting gateway (write: {:?}, read: {:?}, timeout: {}ms)",
            config.write_destination, config.read_destination, config.timeout_ms
        );

        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Underlying transport
    pub fn transport(&self) -> &TransportPtr {
        &self.transport
    }

    /// Send `text` and wait for the correlated text reply
    pub async fn send_and_receive(&self, text: &str) -> Result<Option<String>> {
        require_text(text)?;
        self.round_trip(OutboundMessage::text(text)).await
    }

    /// Send a caller-built message and wait for the correlated text reply
    pub async fn send_and_receive_message(
        &self,
        message: OutboundMessage,
    ) -> Result<Option<String>> {
        self.round_trip(message).await
    }

    async fn round_trip(&self, message: OutboundMessage) -> Result<Option<String>> {
        let start = Instant::now();
        let result = self.exchange(message).await;

        let outcome = match &result {
            Ok(Some(_)) => "reply",
            Ok(None) => "timeout",
            Err(_) => "error",
        };
        GATEWAY_ROUND_TRIP_DURATION
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!("Unable to send/receive message: {}", e);
        }

        result
    }

    async fn exchange(&self, message: OutboundMessage) -> Result<Option<String>> {
        // Fail before sending if a reply could never be read
        let read_destination = self.read_destination()?;
        let sent = self.send(message).await?;
        let selector = Selector::reply_to(&sent);

        match self.receive_matching(&selector, read_destination).await? {
            Some(reply) => Ok(Some(reply.into_text()?)),
            None => Ok(None),
        }
    }

    /// Send text to the write destination
    pub async fn send_text(&self, text: &str) -> Result<Message> {
        require_text(text)?;
        self.dispatch(OutboundMessage::text(text), self.config.write_destination.as_deref())
            .await
    }

    /// Send text with an explicit correlation id to the write destination
    pub async fn send_text_correlated(&self, text: &str, correlation_id: &str) -> Result<Message> {
        require_text(text)?;
        let message = OutboundMessage::text(text).with_correlation_id(correlation_id);
        self.dispatch(message, self.config.write_destination.as_deref())
            .await
    }

    /// Send text to a specific destination
    pub async fn send_text_to(&self, text: &str, destination: &str) -> Result<Message> {
        require_text(text)?;
        self.send_to(OutboundMessage::text(text), destination).await
    }

    /// Send a caller-built message to the write destination
    pub async fn send(&self, message: OutboundMessage) -> Result<Message> {
        self.dispatch(message, self.config.write_destination.as_deref())
            .await
    }

    /// Send a caller-built message to a specific destination
    pub async fn send_to(&self, message: OutboundMessage, destination: &str) -> Result<Message> {
        let destination = Some(destination).filter(|d| !d.trim().is_empty());
        self.dispatch(message, destination).await
    }

    async fn dispatch(
        &self,
        message: OutboundMessage,
        destination: Option<&str>,
    ) -> Result<Message> {
        let destination = destination.ok_or_else(|| {
            Error::messaging("Unable to send message", "no destination configured")
        })?;

        debug!("Sending message to destination '{}'...", destination);

        match self.transport.send(destination, message).await {
            Ok(sent) => {
                GATEWAY_SEND_TOTAL
                    .with_label_values(&[destination, "success"])
                    .inc();
                debug!("Message {} sent to {}", sent.id, destination);
                Ok(sent)
            }
            Err(e) => {
                GATEWAY_SEND_TOTAL
                    .with_label_values(&[destination, "error"])
                    .inc();
                Err(Error::messaging(
                    format!("Unable to send message to {}", destination),
                    e,
                ))
            }
        }
    }

    /// Receive the first message matching `selector` from the read destination
    pub async fn receive(&self, selector: &str) -> Result<Option<Message>> {
        let selector = parse_selector(selector)?;
        self.receive_matching(&selector, self.read_destination()?)
            .await
    }

    /// Receive the first message matching `selector` from `destination`
    pub async fn receive_from(&self, selector: &str, destination: &str) -> Result<Option<Message>> {
        let selector = parse_selector(selector)?;
        if destination.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "destination cannot be empty".to_string(),
            ));
        }
        self.receive_matching(&selector, destination).await
    }

    /// Receive and unwrap a text message from the read destination
    pub async fn receive_text(&self, selector: &str) -> Result<Option<String>> {
        match self.receive(selector).await? {
            Some(message) => Ok(Some(message.into_text()?)),
            None => Ok(None),
        }
    }

    /// Receive with an already-parsed selector, bounded by the configured timeout
    pub async fn receive_matching(
        &self,
        selector: &Selector,
        destination: &str,
    ) -> Result<Option<Message>> {
        let deadline = deadline_after(self.config.timeout());
        self.poll(destination, selector, deadline).await
    }

    /// Poll `destination` until a message matches or `deadline` passes.
    ///
    /// The transport is never called once the deadline has passed, and each
    /// attempt's wait is clamped to the time remaining.
    pub(crate) async fn poll(
        &self,
        destination: &str,
        selector: &Selector,
        deadline: Instant,
    ) -> Result<Option<Message>> {
        debug!("Selecting message on {} using: {}", destination, selector);

        let poll_wait = self.config.poll_wait();
        let backoff = self.config.poll_backoff();

        loop {
            let now = Instant::now();
            if now >= deadline {
                GATEWAY_RECEIVE_TOTAL
                    .with_label_values(&[destination, "timeout"])
                    .inc();
                debug!("No message matching {} before deadline", selector);
                return Ok(None);
            }

            GATEWAY_POLL_ATTEMPTS.inc();
            let wait = poll_wait.min(deadline - now);

            match self
                .transport
                .receive_selected(destination, selector, wait)
                .await
            {
                Ok(Some(message)) => {
                    GATEWAY_RECEIVE_TOTAL
                        .with_label_values(&[destination, "matched"])
                        .inc();
                    trace!("Received message: {:?}", message);
                    return Ok(Some(message));
                }
                Ok(None) => {}
                Err(e) => {
                    GATEWAY_RECEIVE_TOTAL
                        .with_label_values(&[destination, "error"])
                        .inc();
                    return Err(Error::messaging(
                        format!("Unable to receive from {}", destination),
                        e,
                    ));
                }
            }

            if !backoff.is_zero() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                sleep(backoff.min(remaining)).await;
            }
        }
    }

    pub(crate) fn read_destination(&self) -> Result<&str> {
        self.config
            .read_destination
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("read destination is not configured".to_string()))
    }
}

/// Horizon used when a timeout is too large to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Absolute deadline `timeout` from now, saturating for oversized timeouts
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

fn require_text(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(Error::InvalidArgument("message text cannot be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    if selector.trim().is_empty() {
        return Err(Error::InvalidArgument("selector cannot be empty".to_string()));
    }
    Selector::parse(selector)
        .map_err(|e| Error::InvalidArgument(format!("invalid selector {:?}: {}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use crate::message::Payload;
    use crate::transport::Transport;

    fn gateway(config: GatewayConfig) -> (CorrelationGateway, MemoryBroker) {
        let broker = MemoryBroker::new();
        (CorrelationGateway::new(Arc::new(broker.clone()), config), broker)
    }

    fn quick_config() -> GatewayConfig {
        GatewayConfig {
            write_destination: Some("Q1".to_string()),
            read_destination: Some("Q2".to_string()),
            timeout_ms: 300,
            poll_wait_ms: 50,
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_text_uses_write_destination() {
        let (gateway, broker) = gateway(quick_config());

        let sent = gateway.send_text("hello").await.unwrap();

        assert_eq!(sent.destination, "Q1");
        assert_eq!(sent.correlation_key(), sent.id.as_str());
        assert_eq!(broker.depth("Q1"), 1);
    }

    #[tokio::test]
    async fn test_explicit_correlation_id_overrides_message_id() {
        let (gateway, _broker) = gateway(quick_config());

        let sent = gateway.send_text_correlated("hello", "order-7").await.unwrap();

        assert_eq!(sent.correlation_key(), "order-7");
        assert_ne!(sent.id.as_str(), "order-7");
    }

    #[tokio::test]
    async fn test_send_text_to_explicit_destination() {
        let (gateway, broker) = gateway(quick_config());

        gateway.send_text_to("hello", "audit").await.unwrap();

        assert_eq!(broker.depth("audit"), 1);
        assert_eq!(broker.depth("Q1"), 0);
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid() {
        let (gateway, broker) = gateway(quick_config());

        assert!(matches!(gateway.send_text("").await, Err(Error::InvalidArgument(_))));
        assert!(matches!(
            gateway.send_text_to("", "Q3").await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(broker.depth("Q1"), 0);
    }

    #[tokio::test]
    async fn test_send_without_destination_is_messaging_failure() {
        let (gateway, _broker) = gateway(GatewayConfig {
            write_destination: None,
            ..quick_config()
        });

        let result = gateway.send(OutboundMessage::text("hello")).await;
        assert!(matches!(result, Err(Error::Messaging { .. })));

        let result = gateway.send_to(OutboundMessage::text("hello"), "").await;
        assert!(matches!(result, Err(Error::Messaging { .. })));
    }

    #[tokio::test]
    async fn test_receive_argument_validation() {
        let (gateway, _broker) = gateway(GatewayConfig {
            read_destination: None,
            ..quick_config()
        });

        assert!(matches!(gateway.receive("").await, Err(Error::InvalidArgument(_))));
        assert!(matches!(
            gateway.receive("CorrelationId = 'x'").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            gateway.receive_from("CorrelationId = 'x'", " ").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            gateway.receive_from("CorrelationId 'x'", "Q2").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_returns_queued_match() {
        let (gateway, broker) = gateway(quick_config());
        broker
            .send("Q2", OutboundMessage::text("pong").with_correlation_id("ID:1"))
            .await
            .unwrap();

        let text = gateway.receive_text("CorrelationId = 'ID:1'").await.unwrap();
        assert_eq!(text.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_receive_text_rejects_binary() {
        let (gateway, broker) = gateway(quick_config());
        broker
            .send("Q2", OutboundMessage::binary(vec![0xde, 0xad]).with_correlation_id("ID:2"))
            .await
            .unwrap();

        let result = gateway.receive_text("CorrelationId = 'ID:2'").await;
        assert!(matches!(result, Err(Error::Messaging { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_and_receive_times_out_to_none() {
        let (gateway, _broker) = gateway(quick_config());
        let start = Instant::now();

        let reply = gateway.send_and_receive("ping").await.unwrap();

        assert!(reply.is_none());
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_closed_transport_is_messaging_failure() {
        let (gateway, broker) = gateway(quick_config());
        broker.close();

        let send = gateway.send_and_receive("ping").await;
        assert!(matches!(send, Err(Error::Messaging { .. })));

        let receive = gateway.receive("CorrelationId = 'x'").await;
        assert!(matches!(receive, Err(Error::Messaging { .. })));
    }

    #[tokio::test]
    async fn test_deadline_after_saturates() {
        let now = Instant::now();

        assert!(deadline_after(Duration::MAX) >= now + FAR_FUTURE);
        assert!(deadline_after(Duration::from_millis(10)) <= Instant::now() + Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_receive_with_unbounded_timeout() {
        let (gateway, broker) = gateway(GatewayConfig {
            timeout_ms: u64::MAX,
            ..quick_config()
        });
        broker
            .send("Q2", OutboundMessage::text("pong").with_correlation_id("ID:3"))
            .await
            .unwrap();

        let text = gateway.receive_text("CorrelationId = 'ID:3'").await.unwrap();
        assert_eq!(text.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_send_and_receive_message_with_headers() {
        let (gateway, broker) = gateway(quick_config());
        let responder = broker.clone();

        tokio::spawn(async move {
            let request = responder
                .receive_selected("Q1", &Selector::parse("Tenant = acme").unwrap(), Duration::from_secs(1))
                .await
                .unwrap()
                .expect("request with tenant header");
            let reply = request.reply(Payload::Text("ack".to_string()));
            responder.send("Q2", reply).await.unwrap();
        });

        let reply = gateway
            .send_and_receive_message(OutboundMessage::text("order").with_header("Tenant", "acme"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("ack"));
    }
}
