//! Log output of the operation decorator, captured through a fmt subscriber

use op_log::{Classify, OperationLog};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::Level;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn output(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn subscriber(capture: &Capture, level: Level) -> impl tracing::Subscriber + Send + Sync {
    let writer = capture.clone();
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish()
}

#[derive(Debug, Error)]
#[error("disk on fire")]
struct DiskFault;

#[derive(Debug, Error)]
#[error("journal write {id} failed")]
struct WriteFailed {
    id: u32,
    #[source]
    source: DiskFault,
}

impl Classify for WriteFailed {}

#[derive(Debug, Error, PartialEq)]
#[error("amount must be positive")]
struct BadAmount;

impl Classify for BadAmount {
    fn is_validation(&self) -> bool {
        true
    }
}

#[test]
fn test_failure_produces_one_diagnostic_entry_and_returns_original() {
    let capture = Capture::default();
    let log = OperationLog::new("journal");

    let result: Result<u64, WriteFailed> = tracing::subscriber::with_default(
        subscriber(&capture, Level::DEBUG),
        || {
            log.call("append", &[&"entry-17", &42u32], || {
                Err(WriteFailed {
                    id: 17,
                    source: DiskFault,
                })
            })
        },
    );

    let err = result.unwrap_err();
    assert_eq!(err.id, 17, "the original error comes back untouched");

    let output = capture.output();
    assert_eq!(output.matches("occurrence_id=").count(), 1, "{}", output);
    assert_eq!(output.matches(" ERROR ").count(), 1, "{}", output);
    assert!(output.contains("journal write 17 failed"));
    assert!(output.contains("# Method: append"));
    assert!(output.contains("# Receiver: journal"));
    assert!(output.contains("# Arguments: (\"entry-17\", 42)"));
    assert!(output.contains("# Caused by [1]: disk on fire"));
    assert!(output.contains("# Root cause: DiskFault"));
}

#[test]
fn test_validation_error_is_brief_debug() {
    let capture = Capture::default();
    let log = OperationLog::new("orders");

    let result: Result<(), BadAmount> = tracing::subscriber::with_default(
        subscriber(&capture, Level::DEBUG),
        || log.call_void("place", &[&-5i64], || Err(BadAmount)),
    );

    assert_eq!(result, Err(BadAmount));

    let output = capture.output();
    assert!(!output.contains(" ERROR "), "{}", output);
    assert!(!output.contains("# Root cause"));
    assert!(output.contains("EXCEPTION"));
    assert!(output.contains("amount must be positive"));
    assert!(output.contains("occurrence_id="));
}

#[test]
fn test_entry_and_exit_are_logged_at_debug() {
    let capture = Capture::default();
    let log = OperationLog::new("pricing");

    let result: Result<u32, BadAmount> = tracing::subscriber::with_default(
        subscriber(&capture, Level::DEBUG),
        || log.call("quote", &[&"EUR"], || Ok(99)),
    );

    assert_eq!(result, Ok(99));
    let output = capture.output();
    assert!(output.contains("Entry --> quote(\"EUR\")"), "{}", output);
    assert!(output.contains("Exit <-- quote - 99"), "{}", output);
}

#[test]
fn test_void_exit_marker() {
    let capture = Capture::default();
    let log = OperationLog::new("pricing");

    let _: Result<(), BadAmount> = tracing::subscriber::with_default(
        subscriber(&capture, Level::DEBUG),
        || log.call_void("refresh", &[], || Ok(())),
    );

    assert!(capture.output().contains("Exit <-- refresh - void"));
}

struct Loud;

impl std::fmt::Debug for Loud {
    fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        panic!("arguments must not be rendered when DEBUG is off");
    }
}

#[test]
fn test_arguments_not_rendered_when_debug_disabled() {
    let capture = Capture::default();
    let log = OperationLog::new("pricing");

    let result: Result<u32, BadAmount> = tracing::subscriber::with_default(
        subscriber(&capture, Level::INFO),
        || log.call("quote", &[&Loud], || Ok(1)),
    );

    assert_eq!(result, Ok(1));
    assert!(capture.output().is_empty());
}

#[tokio::test]
async fn test_async_invoke_passes_value_through() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(subscriber(&capture, Level::DEBUG));
    let log = OperationLog::new("gateway").with_max_render_len(8);

    let payload = "a very long payload indeed".to_string();
    let result: Result<String, BadAmount> = log
        .invoke("echo", &[&payload], async { Ok(payload.to_uppercase()) })
        .await;

    assert_eq!(result.unwrap(), "A VERY LONG PAYLOAD INDEED");
    let output = capture.output();
    assert!(output.contains("Entry --> echo(\"a very ...(28 chars))"), "{}", output);
}
