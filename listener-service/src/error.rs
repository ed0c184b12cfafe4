//! Error types for the service layer

use thiserror::Error;

/// Service error
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Messaging operation failed underneath the service
    #[error("{context}")]
    Failure {
        /// What the service was doing
        context: String,
        /// Gateway error
        #[source]
        source: queue_gateway::Error,
    },
}

impl ServiceError {
    /// Wrap a gateway error
    pub fn failure(context: impl Into<String>, source: queue_gateway::Error) -> Self {
        ServiceError::Failure {
            context: context.into(),
            source,
        }
    }

    /// Underlying gateway error
    pub fn gateway_error(&self) -> &queue_gateway::Error {
        match self {
            ServiceError::Failure { source, .. } => source,
        }
    }
}

impl op_log::Classify for ServiceError {
    fn is_validation(&self) -> bool {
        self.gateway_error().is_invalid_argument()
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, ServiceError>;
