use crate::error::{ParseResult, Result};
use archivist_document::Document;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Something that reads an original file and produces its text and,
/// optionally, a PDF archive rendition.
pub trait Parser: Send {
    /// Parses `source`. Every error returned here is considered transient.
    fn parse(&mut self, source: &Path, mime_type: &str, display_name: &str) -> ParseResult<()>;
    /// Text extracted by the last successful [`parse`](Self::parse).
    fn text(&self) -> String;
    /// The archive rendition produced by the last successful
    /// [`parse`](Self::parse), if any.
    fn archive_path(&self) -> Option<PathBuf>;
    /// Releases whatever the parser holds (temporary files, mostly). Called
    /// exactly once per parser, after its single attempt.
    fn cleanup(&mut self);
}

/// Hands out a fresh parser for a MIME type.
pub trait ParserFactory: Send + Sync {
    fn create(&self, mime_type: &str) -> Result<Box<dyn Parser>>;
}
impl<F> ParserFactory for F
where
    F: Fn(&str) -> Result<Box<dyn Parser>> + Send + Sync,
{
    fn create(&self, mime_type: &str) -> Result<Box<dyn Parser>> {
        self(mime_type)
    }
}

/// Persists document records. A failed save is fatal for the document being
/// regenerated.
pub trait DocumentStore: Send + Sync {
    fn save(&self, doc: &Document) -> Result<()>;
}

/// Owns a parser for the duration of one attempt and cleans it up when
/// dropped, whichever way the attempt ends.
pub struct ParserGuard {
    parser: Box<dyn Parser>,
}
impl ParserGuard {
    pub fn new(parser: Box<dyn Parser>) -> Self {
        Self { parser }
    }

    pub fn acquire(factory: &dyn ParserFactory, mime_type: &str) -> Result<Self> {
        let parser = factory.create(mime_type)?;
        Ok(Self::new(parser))
    }
}
impl Deref for ParserGuard {
    type Target = dyn Parser;

    fn deref(&self) -> &Self::Target {
        self.parser.as_ref()
    }
}
impl DerefMut for ParserGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.parser.as_mut()
    }
}
impl Drop for ParserGuard {
    fn drop(&mut self) {
        self.parser.cleanup();
    }
}
