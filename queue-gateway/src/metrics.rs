//! Prometheus metrics for the gateway

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};

lazy_static! {
    /// Total messages sent
    pub static ref GATEWAY_SEND_TOTAL: CounterVec = register_counter_vec!(
        "queue_gateway_send_total",
        "Total messages sent",
        &["destination", "status"]
    )
    .unwrap();

    /// Receive outcomes (matched/timeout/error)
    pub static ref GATEWAY_RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "queue_gateway_receive_total",
        "Total receive operations by outcome",
        &["destination", "outcome"]
    )
    .unwrap();

    /// Individual selective receive attempts issued to the transport
    pub static ref GATEWAY_POLL_ATTEMPTS: IntCounter = register_int_counter!(
        "queue_gateway_poll_attempts_total",
        "Selective receive attempts issued to the transport"
    )
    .unwrap();

    /// Send-and-receive round trip duration
    pub static ref GATEWAY_ROUND_TRIP_DURATION: HistogramVec = register_histogram_vec!(
        "queue_gateway_round_trip_duration_seconds",
        "Send-and-receive round trip duration in seconds",
        &["outcome"]
    )
    .unwrap();
}
