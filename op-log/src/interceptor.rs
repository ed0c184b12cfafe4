//! Explicit logging decorator for operations
//!
//! Each call goes `ENTERED -> EXITED_NORMALLY | EXITED_WITH_EXCEPTION`:
//!
//! - entry: `Entry --> method(args)` at DEBUG, rendered only when DEBUG is on
//! - normal exit: `Exit <-- method - void` or the rendered return value
//! - error exit: a fresh occurrence id; validation errors get one brief DEBUG
//!   line, anything else one ERROR event carrying the full diagnostic dump
//!
//! The error is always handed back to the caller untouched.

use crate::{
    occurrence::OccurrenceId,
    record::DiagnosticRecord,
    render::{render_args, render_value, Arg, DEFAULT_MAX_RENDER_LEN},
    Classify,
};
use std::error::Error;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, error, Level};

/// Logging decorator bound to one component
#[derive(Debug, Clone)]
pub struct OperationLog {
    receiver: String,
    max_render_len: usize,
}

impl OperationLog {
    /// Decorator for the component called `receiver`
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            max_render_len: DEFAULT_MAX_RENDER_LEN,
        }
    }

    /// Cap rendered arguments and return values at `max_render_len` characters
    pub fn with_max_render_len(mut self, max_render_len: usize) -> Self {
        self.max_render_len = max_render_len;
        self
    }

    /// Component name
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Log around an async operation returning a value
    pub async fn invoke<T, E, Fut>(
        &self,
        method: &str,
        args: &[Arg<'_>],
        operation: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Debug,
        E: Error + Classify + 'static,
    {
        self.enter(method, args);
        let result = operation.await;
        self.exit_value(method, args, &result);
        result
    }

    /// Log around an async operation returning nothing
    pub async fn invoke_void<E, Fut>(
        &self,
        method: &str,
        args: &[Arg<'_>],
        operation: Fut,
    ) -> Result<(), E>
    where
        Fut: Future<Output = Result<(), E>>,
        E: Error + Classify + 'static,
    {
        self.enter(method, args);
        let result = operation.await;
        self.exit_void(method, args, &result);
        result
    }

    /// Log around a blocking operation returning a value
    pub fn call<T, E, F>(&self, method: &str, args: &[Arg<'_>], operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: Debug,
        E: Error + Classify + 'static,
    {
        self.enter(method, args);
        let result = operation();
        self.exit_value(method, args, &result);
        result
    }

    /// Log around a blocking operation returning nothing
    pub fn call_void<E, F>(&self, method: &str, args: &[Arg<'_>], operation: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
        E: Error + Classify + 'static,
    {
        self.enter(method, args);
        let result = operation();
        self.exit_void(method, args, &result);
        result
    }

    fn enter(&self, method: &str, args: &[Arg<'_>]) {
        if tracing::enabled!(Level::DEBUG) {
            let rendered = render_args(args, self.max_render_len);
            debug!(receiver = %self.receiver, "Entry --> {}({})", method, rendered);
        }
    }

    fn exit_value<T, E>(&self, method: &str, args: &[Arg<'_>], result: &Result<T, E>)
    where
        T: Debug,
        E: Error + Classify + 'static,
    {
        match result {
            Ok(value) => debug!(
                receiver = %self.receiver,
                "Exit <-- {} - {}",
                method,
                render_value(value, self.max_render_len)
            ),
            Err(err) => self.exception(method, args, err),
        }
    }

    fn exit_void<E>(&self, method: &str, args: &[Arg<'_>], result: &Result<(), E>)
    where
        E: Error + Classify + 'static,
    {
        match result {
            Ok(()) => debug!(receiver = %self.receiver, "Exit <-- {} - void", method),
            Err(err) => self.exception(method, args, err),
        }
    }

    fn exception<E>(&self, method: &str, args: &[Arg<'_>], err: &E)
    where
        E: Error + Classify + 'static,
    {
        let occurrence_id = OccurrenceId::next();

        if err.is_validation() {
            debug!(
                receiver = %self.receiver,
                %occurrence_id,
                "Exit <-- {} - EXCEPTION {} - {}",
                method,
                std::any::type_name::<E>(),
                err
            );
            return;
        }

        if tracing::enabled!(Level::ERROR) {
            let record = DiagnosticRecord::capture(
                occurrence_id,
                &self.receiver,
                method,
                render_args(args, self.max_render_len),
                err,
            );
            error!(
                receiver = %self.receiver,
                %occurrence_id,
                "Exit <-- {} - EXCEPTION [{}] {}\n{}",
                method,
                record.error_type,
                record.message,
                record.render()
            );
        }
    }
}
