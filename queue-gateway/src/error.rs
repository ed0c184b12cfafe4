//! Error types for the queue gateway

use thiserror::Error;

/// Boxed cause carried by [`Error::Messaging`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Gateway error
#[derive(Debug, Error)]
pub enum Error {
    /// A required value (text, selector, destination) was empty or missing
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport or payload failure during send/receive
    #[error("Messaging failure: {context}")]
    Messaging {
        /// What the gateway was doing when the failure happened
        context: String,
        /// Original cause
        #[source]
        source: BoxError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a cause into a messaging failure
    pub fn messaging<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Messaging {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Whether this error comes from caller input rather than the transport
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

impl From<crate::transport::TransportError> for Error {
    fn from(err: crate::transport::TransportError) -> Self {
        Error::messaging("transport failure", err)
    }
}

impl From<crate::message::PayloadError> for Error {
    fn from(err: crate::message::PayloadError) -> Self {
        Error::messaging("unreadable payload", err)
    }
}

impl op_log::Classify for Error {
    fn is_validation(&self) -> bool {
        self.is_invalid_argument()
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
