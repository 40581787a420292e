//! Rebuilds the archive rendition of a document by running it through a
//! parser again.
//!
//! Parsers are external and may be slow to become available (a text
//! extraction service still starting up, for example), so each document gets
//! a bounded number of attempts with a fixed wait in between. Whatever
//! happens, a document ends up either with an archive file, filename and
//! checksum that agree with each other, or with no archive at all.

mod command;
pub mod error;
mod parser;
mod regenerate;
mod retry;

pub use crate::command::{CommandParser, CommandParserFactory};
pub use crate::parser::{DocumentStore, Parser, ParserFactory, ParserGuard};
pub use crate::regenerate::{ArchiveRegenerator, Outcome};
pub use crate::retry::{Attempt, RetryPolicy, Sleeper, ThreadSleeper};
