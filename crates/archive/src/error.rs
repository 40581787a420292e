//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Parser failures ([`ParseErrorKind`]) are kept apart from everything else:
//! they are expected, retried, and never escape
//! [`ArchiveRegenerator::regenerate`](crate::ArchiveRegenerator::regenerate).

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable parser failure with automatic location tracking.
pub type ParseError = exn::Exn<ParseErrorKind>;
/// Result type alias for parser operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Failures that stop regeneration of a document outright.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No parser is available for the document's MIME type.
    #[display("no parser available for {_0}")]
    ParserUnavailable(#[error(not(source))] String),
    /// The configured parser program could not be found.
    #[display("parser program not found: {_0}")]
    ProgramNotFound(#[error(not(source))] String),
    /// The original file the parser would read does not exist.
    #[display("original file not found: {}", _0.display())]
    SourceMissing(#[error(not(source))] PathBuf),
    /// The archive filename could not be resolved or reserved.
    Naming,
    /// The state of the current archive rendition could not be determined.
    Inspect,
    /// The file the parser produced could not be read.
    #[display("could not read parser output at {}", _0.display())]
    ArtifactUnreadable(#[error(not(source))] PathBuf),
    /// Copying the produced archive into place failed.
    #[display("could not install archive at {}", _0.display())]
    Install(#[error(not(source))] PathBuf),
    /// The document store refused to save the document.
    Store,
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Store)
    }
}

/// Ways a parser can fail. All of them are considered transient.
#[derive(Debug, Display, Error)]
pub enum ParseErrorKind {
    /// The parser ran but reported failure.
    #[display("parser failed: {_0}")]
    Failed(#[error(not(source))] String),
    /// The parser did not finish in time and was stopped.
    #[display("parser timed out after {}s", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ParseErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ParseErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        true
    }
}
