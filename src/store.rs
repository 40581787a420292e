//! Documents kept in a single JSON file.

use crate::error::{ErrorKind, Result};
use archivist_archive::DocumentStore;
use archivist_archive::error::{ErrorKind as ArchiveErrorKind, Result as ArchiveResult};
use archivist_document::Document;
use exn::ResultExt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// A JSON array of documents, loaded once and rewritten in full on every save.
pub struct JsonStore {
    path: PathBuf,
    documents: Mutex<Vec<Document>>,
}
impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).or_raise(|| ErrorKind::ReadStore(path.clone()))?;
        let documents: Vec<Document> =
            serde_json::from_reader(BufReader::new(file)).or_raise(|| ErrorKind::ReadStore(path.clone()))?;
        tracing::debug!(path = %path.display(), count = documents.len(), "Loaded documents");
        Ok(Self { path, documents: Mutex::new(documents) })
    }

    /// A snapshot of the stored documents, optionally narrowed down to one.
    pub fn select(&self, id: Option<u64>) -> Result<Vec<Document>> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        match id {
            None => Ok(documents.clone()),
            Some(id) => match documents.iter().find(|doc| doc.id == id) {
                Some(doc) => Ok(vec![doc.clone()]),
                None => exn::bail!(ErrorKind::DocumentNotFound(id)),
            },
        }
    }

    /// Replaces the stored document with the same id (or appends it) and
    /// rewrites the file.
    pub fn put(&self, doc: &Document) -> Result<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        match documents.iter_mut().find(|stored| stored.id == doc.id) {
            Some(stored) => *stored = doc.clone(),
            None => documents.push(doc.clone()),
        }
        write_atomically(&self.path, &documents).or_raise(|| ErrorKind::WriteStore(self.path.clone()))
    }
}
impl DocumentStore for JsonStore {
    fn save(&self, doc: &Document) -> ArchiveResult<()> {
        self.put(doc).or_raise(|| ArchiveErrorKind::Store)
    }
}

/// Serializes next to `path` and renames over it, so readers never see a
/// half-written file.
fn write_atomically(path: &Path, documents: &[Document]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, documents)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}
