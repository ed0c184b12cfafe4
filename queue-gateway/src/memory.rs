//! In-process broker
//!
//! Destinations are FIFO queues created on first use. A selective receive
//! removes the oldest message matching the selector and leaves the rest in
//! place; waiting receivers are woken on every delivery.

use crate::{
    gateway::deadline_after,
    message::{Message, MessageId, OutboundMessage},
    selector::Selector,
    transport::{Transport, TransportError},
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout_at;
use tracing::trace;

#[derive(Debug, Default)]
struct Queue {
    messages: Mutex<VecDeque<Message>>,
    arrivals: Notify,
}

impl Queue {
    fn push(&self, message: Message) {
        self.messages.lock().push_back(message);
        self.arrivals.notify_waiters();
    }

    fn take_matching(&self, selector: &Selector) -> Option<Message> {
        let mut messages = self.messages.lock();
        let index = messages.iter().position(|m| selector.matches(m))?;
        messages.remove(index)
    }
}

/// In-process queue broker
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<DashMap<String, Arc<Queue>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, destination: &str) -> Arc<Queue> {
        let entry = self.queues.entry(destination.to_string()).or_default();
        Arc::clone(entry.value())
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    /// Enqueue a message that already carries its id
    pub fn deliver(&self, destination: &str, message: Message) -> Result<(), TransportError> {
        self.ensure_open()?;
        trace!("Delivering {} to {}", message.id, destination);
        self.queue(destination).push(message);
        Ok(())
    }

    /// Number of messages waiting on a destination
    pub fn depth(&self, destination: &str) -> usize {
        self.queues
            .get(destination)
            .map_or(0, |queue| queue.messages.lock().len())
    }

    /// Refuse all further sends and receives, waking blocked receivers
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for queue in self.queues.iter() {
            queue.arrivals.notify_waiters();
        }
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn send(
        &self,
        destination: &str,
        message: OutboundMessage,
    ) -> Result<Message, TransportError> {
        let message = message.into_message(MessageId::generate(), destination);
        self.deliver(destination, message.clone())?;
        Ok(message)
    }

    async fn receive_selected(
        &self,
        destination: &str,
        selector: &Selector,
        wait: Duration,
    ) -> Result<Option<Message>, TransportError> {
        let queue = self.queue(destination);
        let deadline = deadline_after(wait);

        loop {
            // Register before checking so a delivery in between is not missed
            let arrival = queue.arrivals.notified();

            self.ensure_open()?;
            if let Some(message) = queue.take_matching(selector) {
                return Ok(Some(message));
            }

            if timeout_at(deadline, arrival).await.is_err() {
                return Ok(None);
            }
        }
    }
}
