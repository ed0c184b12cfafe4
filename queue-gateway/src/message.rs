//! Message envelopes exchanged with the transport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Transport-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh identifier (UUIDv7, so ids sort by creation time)
    pub fn generate() -> Self {
        Self(format!("ID:{}", Uuid::now_v7()))
    }

    /// Wrap an identifier assigned elsewhere
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Binary(Vec<u8>),
}

impl Payload {
    /// Whether the payload carries nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(text) => text.is_empty(),
            Payload::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// Raised when a message cannot be read the way the caller asked
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// The message body is not text
    #[error("message {0} does not carry a text payload")]
    NotText(MessageId),
}

/// Message under construction, before the transport assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Body
    pub payload: Payload,

    /// Explicit correlation id (overrides the transport id for reply matching)
    pub correlation_id: Option<String>,

    /// Custom headers
    pub headers: HashMap<String, String>,
}

impl OutboundMessage {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_payload(Payload::Text(text.into()))
    }

    /// Create a binary message
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_payload(Payload::Binary(bytes.into()))
    }

    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            correlation_id: None,
            headers: HashMap::new(),
        }
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Stamp with a transport id; used by transport adapters on send
    pub fn into_message(self, id: MessageId, destination: impl Into<String>) -> Message {
        Message {
            id,
            destination: destination.into(),
            correlation_id: self.correlation_id,
            payload: self.payload,
            headers: self.headers,
            timestamp: Utc::now(),
        }
    }
}

/// Message as seen after send or on receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned id
    pub id: MessageId,

    /// Destination the message was sent to
    pub destination: String,

    /// Correlation id, if any
    pub correlation_id: Option<String>,

    /// Body
    pub payload: Payload,

    /// Custom headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Send timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Key a reply must echo as its correlation id.
    ///
    /// The explicit correlation id wins over the transport-assigned id.
    pub fn correlation_key(&self) -> &str {
        self.correlation_id
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Text body, or `None` for binary messages
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Consume into the text body
    pub fn into_text(self) -> Result<String, PayloadError> {
        match self.payload {
            Payload::Text(text) => Ok(text),
            Payload::Binary(_) => Err(PayloadError::NotText(self.id)),
        }
    }

    /// Header lookup
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Build a reply carrying this message's correlation key
    pub fn reply(&self, payload: Payload) -> OutboundMessage {
        OutboundMessage {
            payload,
            correlation_id: Some(self.correlation_key().to_string()),
            headers: HashMap::new(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
