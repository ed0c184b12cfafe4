//! Multi-reply collection
//!
//! Repeats the gateway's single-receive poll until enough messages have been
//! gathered or the overall timeout passes. Results keep arrival order and
//! redeliveries are not filtered out.

use crate::{
    gateway::{deadline_after, parse_selector, CorrelationGateway},
    message::Message,
    Error, Result,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

impl CorrelationGateway {
    /// Collect up to `max_count` messages matching `selector` from the read
    /// destination within `total_timeout`.
    ///
    /// Fewer messages than requested (including none) is a valid result.
    pub async fn receive_multiple(
        &self,
        selector: &str,
        max_count: usize,
        total_timeout: Duration,
    ) -> Result<Vec<Message>> {
        let selector = parse_selector(selector)?;
        let destination = self.read_destination()?;

        debug!("Searching messages by: {}", selector);

        let deadline = deadline_after(total_timeout);
        let mut messages = Vec::new();

        while messages.len() < max_count && Instant::now() < deadline {
            // A single attempt never outlives either the gateway timeout or
            // the overall collection deadline
            let attempt_deadline = deadline.min(deadline_after(self.config().timeout()));
            if let Some(message) = self.poll(destination, &selector, attempt_deadline).await? {
                messages.push(message);
            }
        }

        debug!(
            "{} messages collected (requested up to {})",
            messages.len(),
            max_count
        );

        Ok(messages)
    }

    /// Text variant of [`receive_multiple`](Self::receive_multiple); fails if
    /// any collected message is not text.
    pub async fn receive_multiple_text(
        &self,
        selector: &str,
        max_count: usize,
        total_timeout: Duration,
    ) -> Result<Vec<String>> {
        self.receive_multiple(selector, max_count, total_timeout)
            .await?
            .into_iter()
            .map(|message| message.into_text().map_err(Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::GatewayConfig, memory::MemoryBroker, message::OutboundMessage,
        transport::Transport, CorrelationGateway, Error,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn gateway() -> (CorrelationGateway, MemoryBroker) {
        let broker = MemoryBroker::new();
        let config = GatewayConfig {
            read_destination: Some("Q2".to_string()),
            timeout_ms: 200,
            poll_wait_ms: 20,
            ..GatewayConfig::default()
        };
        (CorrelationGateway::new(Arc::new(broker.clone()), config), broker)
    }

    async fn queue_reply(broker: &MemoryBroker, text: &str, key: &str) {
        broker
            .send("Q2", OutboundMessage::text(text).with_correlation_id(key))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stops_at_max_count() {
        let (gateway, broker) = gateway();
        for text in ["a", "b", "c", "d"] {
            queue_reply(&broker, text, "batch").await;
        }

        let texts = gateway
            .receive_multiple_text("CorrelationId = 'batch'", 3, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(broker.depth("Q2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_count_returns_immediately() {
        let (gateway, broker) = gateway();
        queue_reply(&broker, "a", "batch").await;
        let start = Instant::now();

        let messages = gateway
            .receive_multiple("CorrelationId = 'batch'", 0, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(messages.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_after_total_timeout() {
        let (gateway, _broker) = gateway();
        let start = Instant::now();

        let messages = gateway
            .receive_multiple("CorrelationId = 'nobody'", 2, Duration::from_millis(500))
            .await
            .unwrap();

        assert!(messages.is_empty());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_unbounded_total_timeout() {
        let (gateway, broker) = gateway();
        queue_reply(&broker, "only", "max").await;

        let texts = gateway
            .receive_multiple_text("CorrelationId = 'max'", 1, Duration::MAX)
            .await
            .unwrap();

        assert_eq!(texts, vec!["only"]);
    }

    #[tokio::test]
    async fn test_duplicates_pass_through() {
        let (gateway, broker) = gateway();
        queue_reply(&broker, "same", "dup").await;
        queue_reply(&broker, "same", "dup").await;

        let texts = gateway
            .receive_multiple_text("CorrelationId = 'dup'", 2, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(texts, vec!["same", "same"]);
    }

    #[tokio::test]
    async fn test_binary_message_fails_text_collection() {
        let (gateway, broker) = gateway();
        queue_reply(&broker, "ok", "mixed").await;
        broker
            .send(
                "Q2",
                OutboundMessage::binary(vec![1, 2]).with_correlation_id("mixed"),
            )
            .await
            .unwrap();

        let result = gateway
            .receive_multiple_text("CorrelationId = 'mixed'", 2, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(Error::Messaging { .. })));
    }

    #[tokio::test]
    async fn test_requires_selector_and_read_destination() {
        let (gateway, _broker) = gateway();
        let result = gateway.receive_multiple("", 1, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let broker = MemoryBroker::new();
        let unset = CorrelationGateway::new(
            Arc::new(broker),
            GatewayConfig {
                read_destination: None,
                ..GatewayConfig::default()
            },
        );
        let result = unset
            .receive_multiple("CorrelationId = 'x'", 1, Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
