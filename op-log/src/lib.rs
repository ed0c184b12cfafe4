//! Operation logging
//!
//! Explicit decoration of service and gateway calls with entry/exit logging
//! and diagnostic dumps for failures:
//!
//! ```
//! use op_log::{Classify, OperationLog};
//!
//! #[derive(Debug)]
//! struct Rejected;
//! impl std::fmt::Display for Rejected {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("rejected")
//!     }
//! }
//! impl std::error::Error for Rejected {}
//! impl Classify for Rejected {
//!     fn is_validation(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let log = OperationLog::new("orders");
//! let amount = 10;
//! let result: Result<u32, Rejected> = log.call("double", &[&amount], || Ok(amount * 2));
//! assert_eq!(result.unwrap(), 20);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod interceptor;
pub mod occurrence;
pub mod record;
pub mod render;

pub use interceptor::OperationLog;
pub use occurrence::OccurrenceId;
pub use record::DiagnosticRecord;
pub use render::Arg;

/// Severity classification of errors passing through [`OperationLog`]
pub trait Classify {
    /// Expected, caller-caused failure (bad input). Logged briefly at DEBUG
    /// instead of as a full ERROR dump.
    fn is_validation(&self) -> bool {
        false
    }
}
