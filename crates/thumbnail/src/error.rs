//! Thumbnail Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;
use std::time::Duration;

/// A thumbnail error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for thumbnail operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("image conversion tool not detected on your system")]
    ToolNotFound,
    /// The tool exited unsuccessfully; carries its exit status and last line
    /// of output.
    #[display("image conversion failed: {_0}")]
    ConversionFailed(#[error(not(source))] String),
    #[display("image conversion timed out after {}s", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
    #[display("could not read thumbnail directory {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    /// The batch's scratch directory could not be created.
    Scratch,
    #[display("could not install converted thumbnail at {}", _0.display())]
    Install(#[error(not(source))] PathBuf),
    #[display("could not remove legacy thumbnail {}", _0.display())]
    Remove(#[error(not(source))] PathBuf),
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io)
    }
}
