use crate::checksum::md5_file;
use crate::error::{ErrorKind, Result};
use crate::layout::Layout;
use crate::model::Document;
use derive_more::Display;
use exn::ResultExt;
use std::path::PathBuf;
use tracing::instrument;

/// What is on disk for a document's archive rendition, compared with what the
/// document records about it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ArchiveStatus {
    /// No archive recorded and none expected.
    #[display("absent")]
    Absent,
    /// The recorded file exists and its checksum matches.
    #[display("present")]
    Present,
    /// Something is recorded but the file is gone (or only half the record
    /// survives).
    #[display("missing")]
    Missing,
    /// The recorded file exists but its content no longer matches the checksum.
    #[display("stale")]
    Stale,
    /// Nothing is recorded, but a file sits where archives used to be named
    /// before archive filenames were stored separately.
    #[display("legacy ({})", _0.display())]
    Legacy(PathBuf),
}
impl ArchiveStatus {
    /// Inspects the archive root for `doc`.
    #[instrument(skip_all, fields(document_id = doc.id))]
    pub fn inspect(layout: &Layout, doc: &Document) -> Result<Self> {
        let Some(path) = layout.archive_path(doc) else {
            if doc.archive_checksum.is_some() {
                return Ok(Self::Missing);
            }
            let legacy = layout.legacy_archive_path(doc);
            return Ok(match legacy.is_file() {
                true => Self::Legacy(legacy),
                false => Self::Absent,
            });
        };
        if !path.is_file() {
            return Ok(Self::Missing);
        }
        let Some(expected) = doc.archive_checksum.as_deref() else {
            return Ok(Self::Stale);
        };
        let actual = md5_file(&path).or_raise(|| ErrorKind::Unreadable(path.clone()))?;
        if actual.eq_ignore_ascii_case(expected) {
            Ok(Self::Present)
        } else {
            tracing::debug!(path = %path.display(), expected, actual = %actual, "Archive checksum mismatch");
            Ok(Self::Stale)
        }
    }

    /// Whether the archive rendition has to be rebuilt.
    pub fn needs_regeneration(&self) -> bool {
        matches!(self, Self::Missing | Self::Stale | Self::Legacy(_))
    }
}
