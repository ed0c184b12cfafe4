//! Listener Service
//!
//! Service layer over the correlation gateway:
//! - `RelayService` forwarding and request/response operations
//! - `LoggedChannel` decorating gateway calls with operation logging
//! - `QueueListener` consuming the inbound destination with a bounded pool
//!   of concurrent consumers

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod channel;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod service;

pub use channel::{LoggedChannel, MessageChannel};
pub use error::{Result, ServiceError};
pub use listener::{ForwardingHandler, ListenerConfig, ListenerHandle, MessageHandler, QueueListener};
pub use service::RelayService;
