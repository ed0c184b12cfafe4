//! Queue Gateway
//!
//! Synchronous request/response over an asynchronous queue transport:
//! - Correlation-based reply matching (`CorrelationId = '<id>'` selectors)
//! - Deadline-bounded polling receive
//! - Multi-reply collection
//! - In-memory and NATS JetStream transport adapters
//! - Observability via Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use queue_gateway::{transport, CorrelationGateway, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> queue_gateway::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let transport = transport::connect(&config).await?;
//!     let gateway = CorrelationGateway::new(transport, config);
//!
//!     match gateway.send_and_receive("ping").await? {
//!         Some(reply) => println!("reply: {}", reply),
//!         None => println!("no reply before the deadline"),
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod collector;
pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod nats;
pub mod selector;
pub mod transport;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use gateway::CorrelationGateway;
pub use memory::MemoryBroker;
pub use message::{Message, MessageId, OutboundMessage, Payload, PayloadError};
pub use selector::{Selector, SelectorError};
pub use transport::{Transport, TransportError, TransportPtr};
