//! Relay service: the application-facing side of the gateway

use crate::{channel::MessageChannel, error::ServiceError, Result};
use op_log::OperationLog;
use std::sync::Arc;
use tracing::debug;

/// Service forwarding text messages and running request/response exchanges.
/// Every call goes through an [`OperationLog`].
#[derive(Clone)]
pub struct RelayService {
    channel: Arc<dyn MessageChannel>,
    log: OperationLog,
}

impl RelayService {
    /// Create a service over a channel, logging as `RelayService`
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self::with_log(channel, OperationLog::new("RelayService"))
    }

    /// Create a service logging through `log`
    pub fn with_log(channel: Arc<dyn MessageChannel>, log: OperationLog) -> Self {
        Self { channel, log }
    }

    /// Forward a received message to the write destination without waiting
    /// for a reply
    pub async fn propagate_received_message(&self, text: &str) -> Result<()> {
        self.log
            .invoke_void("propagate_received_message", &[&text], self.forward(text))
            .await
    }

    async fn forward(&self, text: &str) -> Result<()> {
        let sent = self
            .channel
            .send_text(text)
            .await
            .map_err(|e| ServiceError::failure("Unable to send message!", e))?;

        debug!("Propagated message as {}", sent.id);
        Ok(())
    }

    /// Send `text` and wait for the correlated reply; `None` when nothing
    /// arrived before the deadline
    pub async fn send_and_receive(&self, text: &str) -> Result<Option<String>> {
        let exchange = async {
            self.channel
                .send_and_receive(text)
                .await
                .map_err(|e| ServiceError::failure("Unable to send/receive message!", e))
        };
        self.log.invoke("send_and_receive", &[&text], exchange).await
    }
}
