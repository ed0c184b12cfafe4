//! Prometheus metrics for the queue listener

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

lazy_static! {
    /// Inbound messages by handling outcome (handled/failed)
    pub static ref LISTENER_MESSAGES_TOTAL: CounterVec = register_counter_vec!(
        "queue_listener_messages_total",
        "Inbound messages by handling outcome",
        &["outcome"]
    )
    .unwrap();

    /// Consumer tasks currently running
    pub static ref LISTENER_CONSUMERS: IntGauge = register_int_gauge!(
        "queue_listener_consumers",
        "Consumer tasks currently running"
    )
    .unwrap();
}
