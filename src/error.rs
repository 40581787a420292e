//! Application Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not read documents from {}", _0.display())]
    ReadStore(#[error(not(source))] PathBuf),
    #[display("could not write documents to {}", _0.display())]
    WriteStore(#[error(not(source))] PathBuf),
    #[display("no document with id {_0}")]
    DocumentNotFound(#[error(not(source))] u64),
    /// The archive parser could not be set up.
    #[display("archive regeneration is unavailable")]
    Parser,
    #[display("thumbnail conversion is unavailable")]
    Thumbnails,
}
