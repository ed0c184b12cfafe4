//! Diagnostic record built when an error escapes a logged operation

use crate::occurrence::OccurrenceId;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::Write as _;

/// Snapshot of a failed call, kept only long enough to be logged
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    /// Occurrence id
    pub occurrence_id: OccurrenceId,

    /// When the failure was observed
    pub timestamp: DateTime<Utc>,

    /// Rust type of the error
    pub error_type: &'static str,

    /// Error message
    pub message: String,

    /// Component the method belongs to
    pub receiver: String,

    /// Method name
    pub method: String,

    /// Rendered arguments
    pub arguments: String,

    /// Deepest link of the `source()` chain, rendered with `{:?}`
    pub root_cause: String,

    /// Every link of the chain below the top-level error
    pub cause_chain: Vec<String>,
}

impl DiagnosticRecord {
    /// Capture a failure
    pub fn capture<E>(
        occurrence_id: OccurrenceId,
        receiver: &str,
        method: &str,
        arguments: String,
        error: &E,
    ) -> Self
    where
        E: Error + 'static,
    {
        let mut cause_chain = Vec::new();
        let mut root: &(dyn Error + 'static) = error;
        while let Some(source) = root.source() {
            cause_chain.push(source.to_string());
            root = source;
        }

        Self {
            occurrence_id,
            timestamp: Utc::now(),
            error_type: std::any::type_name::<E>(),
            message: error.to_string(),
            receiver: receiver.to_string(),
            method: method.to_string(),
            arguments,
            root_cause: format!("{:#?}", root),
            cause_chain,
        }
    }

    /// Multi-line dump for the error log
    pub fn render(&self) -> String {
        let mut dump = String::new();
        let _ = writeln!(dump, "# Occurrence: {}", self.occurrence_id);
        let _ = writeln!(dump, "# Timestamp: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(dump, "# Error: [{}] {}", self.error_type, self.message);
        let _ = writeln!(dump, "# Receiver: {}", self.receiver);
        let _ = writeln!(dump, "# Method: {}", self.method);
        let _ = writeln!(dump, "# Arguments: ({})", self.arguments);
        for (depth, cause) in self.cause_chain.iter().enumerate() {
            let _ = writeln!(dump, "# Caused by [{}]: {}", depth + 1, cause);
        }
        let _ = write!(dump, "# Root cause: {}", self.root_cause);
        dump
    }
}
