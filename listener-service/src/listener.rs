//! Queue listener with a bounded pool of concurrent consumers
//!
//! A supervisor task keeps `min_consumers` core consumers running. When every
//! running consumer is busy handling a message, a consumer asks the supervisor
//! for help and another one is started, up to `max_consumers`. Surplus
//! consumers retire after `idle_polls_before_retire` empty polls in a row.

use crate::{
    metrics::{LISTENER_CONSUMERS, LISTENER_MESSAGES_TOTAL},
    service::RelayService,
    Result,
};
use async_trait::async_trait;
use queue_gateway::{GatewayConfig, Message, Selector, TransportError, TransportPtr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Handler for messages consumed by the listener
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one inbound message
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Forwards every inbound text message through the relay service
#[derive(Clone)]
pub struct ForwardingHandler {
    service: RelayService,
}

impl ForwardingHandler {
    /// Create a handler forwarding through `service`
    pub fn new(service: RelayService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ForwardingHandler {
    async fn handle(&self, message: Message) -> Result<()> {
        match message.text() {
            Some(text) => self.service.propagate_received_message(text).await,
            None => {
                warn!("Ignoring non-text message {}", message.id);
                Ok(())
            }
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Destination to consume
    pub destination: String,

    /// Consumers kept running at all times
    pub min_consumers: usize,

    /// Upper bound on concurrent consumers
    pub max_consumers: usize,

    /// Wait of a single receive attempt
    pub poll_wait: Duration,

    /// Consecutive empty polls after which a surplus consumer retires
    pub idle_polls_before_retire: u32,

    /// Pause after a failed receive
    pub error_backoff: Duration,
}

impl ListenerConfig {
    /// Configuration for `destination` with default pool settings
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            min_consumers: 1,
            max_consumers: 4,
            poll_wait: Duration::from_millis(100),
            idle_polls_before_retire: 10,
            error_backoff: Duration::from_secs(1),
        }
    }

    /// Derive the listener settings from the gateway configuration
    pub fn from_gateway(config: &GatewayConfig) -> queue_gateway::Result<Self> {
        let destination = config.listener_destination.clone().ok_or_else(|| {
            queue_gateway::Error::Config("listener_destination is not configured".to_string())
        })?;

        Ok(Self {
            min_consumers: config.concurrent_consumers,
            max_consumers: config.max_concurrent_consumers,
            poll_wait: config.poll_wait(),
            ..Self::new(destination)
        })
    }
}

/// Why a consumer task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerExit {
    Shutdown,
    Retired,
    TransportClosed,
}

struct Shared<H> {
    transport: TransportPtr,
    handler: Arc<H>,
    config: ListenerConfig,
    active: Arc<AtomicUsize>,
    busy: AtomicUsize,
    scale_up: mpsc::UnboundedSender<()>,
}

/// Decrements the running-consumer count when a consumer ends, however it ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
        LISTENER_CONSUMERS.dec();
    }
}

/// Queue listener
pub struct QueueListener<H> {
    transport: TransportPtr,
    handler: Arc<H>,
    config: ListenerConfig,
}

impl<H: MessageHandler + 'static> QueueListener<H> {
    /// Create a listener; nothing is consumed until [`QueueListener::start`]
    pub fn new(transport: TransportPtr, handler: Arc<H>, config: ListenerConfig) -> Self {
        Self {
            transport,
            handler,
            config,
        }
    }

    /// Start the supervisor and the core consumers
    pub fn start(self) -> ListenerHandle {
        let mut config = self.config;
        config.min_consumers = config.min_consumers.max(1);
        config.max_consumers = config.max_consumers.max(config.min_consumers);

        info!(
            "🎧 Listening on {} ({}..={} consumers)",
            config.destination, config.min_consumers, config.max_consumers
        );

        let active = Arc::new(AtomicUsize::new(0));
        let (scale_tx, scale_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            transport: self.transport,
            handler: self.handler,
            config,
            active: Arc::clone(&active),
            busy: AtomicUsize::new(0),
            scale_up: scale_tx,
        });

        let supervisor = tokio::spawn(supervise(shared, scale_rx, shutdown_rx));

        ListenerHandle {
            shutdown: shutdown_tx,
            supervisor,
            active,
        }
    }
}

/// Handle to a running listener
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl ListenerHandle {
    /// Consumers currently running
    pub fn active_consumers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Stop consuming and wait for in-flight messages to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.supervisor.await {
            error!("Listener supervisor failed: {}", e);
        }
        info!("Listener stopped");
    }
}

async fn supervise<H: MessageHandler + 'static>(
    shared: Arc<Shared<H>>,
    mut scale_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut consumers = JoinSet::new();
    for _ in 0..shared.config.min_consumers {
        spawn_consumer(&shared, &mut consumers, true, &shutdown);
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            Some(()) = scale_rx.recv() => {
                let active = shared.active.load(Ordering::Acquire);
                if active < shared.config.max_consumers {
                    debug!("All {} consumers busy, starting another", active);
                    spawn_consumer(&shared, &mut consumers, false, &shutdown);
                }
            }

            Some(joined) = consumers.join_next() => match joined {
                Ok(ConsumerExit::TransportClosed) => {
                    warn!("Transport closed, listener on {} stopping", shared.config.destination);
                    consumers.abort_all();
                    break;
                }
                Ok(exit) => debug!("Consumer exited: {:?}", exit),
                Err(e) => error!("Consumer task failed: {}", e),
            },
        }
    }

    while let Some(joined) = consumers.join_next().await {
        match joined {
            Err(e) if !e.is_cancelled() => error!("Consumer task failed: {}", e),
            _ => {}
        }
    }
}

fn spawn_consumer<H: MessageHandler + 'static>(
    shared: &Arc<Shared<H>>,
    consumers: &mut JoinSet<ConsumerExit>,
    core: bool,
    shutdown: &watch::Receiver<bool>,
) {
    shared.active.fetch_add(1, Ordering::AcqRel);
    LISTENER_CONSUMERS.inc();
    let guard = ActiveGuard(Arc::clone(&shared.active));
    let consumer = consume(Arc::clone(shared), core, shutdown.clone());

    consumers.spawn(async move {
        let _guard = guard;
        consumer.await
    });
}

async fn consume<H: MessageHandler + 'static>(
    shared: Arc<Shared<H>>,
    core: bool,
    mut shutdown: watch::Receiver<bool>,
) -> ConsumerExit {
    let selector = Selector::all();
    let mut idle_polls = 0u32;

    loop {
        if *shutdown.borrow() {
            return ConsumerExit::Shutdown;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => return ConsumerExit::Shutdown,
            received = shared.transport.receive_selected(
                &shared.config.destination,
                &selector,
                shared.config.poll_wait,
            ) => received,
        };

        match received {
            Ok(Some(message)) => {
                idle_polls = 0;
                shared.dispatch(message).await;
            }
            Ok(None) => {
                idle_polls += 1;
                if !core && idle_polls >= shared.config.idle_polls_before_retire {
                    debug!("Retiring idle consumer after {} empty polls", idle_polls);
                    return ConsumerExit::Retired;
                }
            }
            Err(TransportError::Closed) => return ConsumerExit::TransportClosed,
            Err(e) => {
                error!("Receive from {} failed: {}", shared.config.destination, e);
                tokio::select! {
                    _ = shutdown.changed() => return ConsumerExit::Shutdown,
                    _ = tokio::time::sleep(shared.config.error_backoff) => {}
                }
            }
        }
    }
}

impl<H: MessageHandler> Shared<H> {
    async fn dispatch(&self, message: Message) {
        let busy = self.busy.fetch_add(1, Ordering::AcqRel) + 1;
        let active = self.active.load(Ordering::Acquire);
        if busy >= active && active < self.config.max_consumers {
            let _ = self.scale_up.send(());
        }

        let id = message.id.clone();
        let result = self.handler.handle(message).await;
        self.busy.fetch_sub(1, Ordering::AcqRel);

        match result {
            Ok(()) => {
                LISTENER_MESSAGES_TOTAL.with_label_values(&["handled"]).inc();
            }
            Err(e) => {
                LISTENER_MESSAGES_TOTAL.with_label_values(&["failed"]).inc();
                error!("Failed to handle message {}: {}", id, e);
            }
        }
    }
}
