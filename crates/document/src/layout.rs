use crate::model::{Document, GPG_EXTENSION, Role};
use std::path::{Path, PathBuf};

/// The three directory roots that stored files live under.
///
/// Every path a component touches is derived from one of these roots; nothing
/// reads directory locations from the environment on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub originals: PathBuf,
    pub archive: PathBuf,
    pub thumbnails: PathBuf,
}
impl Layout {
    pub fn new(originals: impl Into<PathBuf>, archive: impl Into<PathBuf>, thumbnails: impl Into<PathBuf>) -> Self {
        Self {
            originals: originals.into(),
            archive: archive.into(),
            thumbnails: thumbnails.into(),
        }
    }

    /// Conventional layout of `originals/`, `archive/` and `thumbnails/` under a
    /// single media directory.
    pub fn under(media: impl AsRef<Path>) -> Self {
        let media = media.as_ref();
        Self::new(media.join("originals"), media.join("archive"), media.join("thumbnails"))
    }

    /// The directory holding files of the given rendition.
    pub fn root(&self, role: Role) -> &Path {
        match role {
            Role::Original => &self.originals,
            Role::Archive => &self.archive,
        }
    }

    /// Location of the original file.
    ///
    /// Documents stored before filenames were recorded live at their padded
    /// identifier plus file type (and `.gpg` when encrypted).
    pub fn source_path(&self, doc: &Document) -> PathBuf {
        match &doc.filename {
            Some(filename) => self.originals.join(filename),
            None => {
                let mut name = format!("{}{}", doc.padded_id(), doc.file_type);
                if doc.storage_type.is_encrypted() {
                    name.push_str(GPG_EXTENSION);
                }
                self.originals.join(name)
            },
        }
    }

    /// Location of the archive rendition, if the document has one.
    pub fn archive_path(&self, doc: &Document) -> Option<PathBuf> {
        doc.archive_filename.as_ref().map(|name| self.archive.join(name))
    }

    /// Where the archive rendition lived before archive names were recorded
    /// separately: the original's name with a `.pdf` extension.
    pub fn legacy_archive_path(&self, doc: &Document) -> PathBuf {
        let name = match &doc.filename {
            Some(filename) => Path::new(filename).with_extension("pdf"),
            None => PathBuf::from(format!("{}.pdf", doc.padded_id())),
        };
        self.archive.join(name)
    }

    /// Location of the cached thumbnail in the given image format.
    pub fn thumbnail_path(&self, doc: &Document, extension: &str) -> PathBuf {
        self.thumbnails.join(format!("{}.{}", doc.padded_id(), extension.trim_start_matches('.')))
    }
}
