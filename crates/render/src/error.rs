//! Render Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::time::Duration;

/// A render error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No wkhtmltopdf executable at the configured path, and none on `PATH`.
    #[display("wkhtmltopdf executable not detected on your system")]
    NoExecutable,
    /// The URL could not be parsed, even after escaping.
    #[display("invalid source: {_0}")]
    InvalidSource(#[error(not(source))] String),
    /// The source cannot be used the way the caller asked (e.g. stylesheets on a URL).
    #[display("improper source: {_0}")]
    ImproperSource(#[error(not(source))] String),
    /// wkhtmltopdf exited unsuccessfully or produced no output.
    /// A status of `None` means the process was killed by a signal.
    #[display("command failed (exit status {}): {command}", status.map_or_else(|| "none".to_string(), |s| s.to_string()))]
    ConversionFailed {
        status: Option<i32>,
        command: String,
        stderr: String,
    },
    /// wkhtmltopdf did not finish before the deadline and was killed.
    #[display("command timed out after {} seconds", _0.as_secs_f64())]
    Timeout(#[error(not(source))] Duration),
    /// A stylesheet file could not be found.
    #[display("asset not found: {_0}")]
    AssetNotFound(#[error(not(source))] String),
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Every conversion failure is terminal; callers decide whether to try again.
        false
    }
}
