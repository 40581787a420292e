use std::fmt::{Display, Formatter, Result as FmtResult};
use time::Date;

/// Suffix appended to every file of a GPG-encrypted document.
pub const GPG_EXTENSION: &str = ".gpg";

/// How the original file is kept on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StorageType {
    #[default]
    Unencrypted,
    Gpg,
}
impl StorageType {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Gpg)
    }
}

/// Which of a document's two renditions a filename refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The file as it was uploaded.
    Original,
    /// The normalized PDF copy.
    Archive,
}
impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Original => "original",
            Role::Archive => "archive",
        }
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A stored document, as far as file naming and archiving are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    pub id: u64,
    /// Path of the original file relative to the originals root, once assigned.
    #[cfg_attr(feature = "serde", serde(default))]
    pub filename: Option<String>,
    pub mime_type: String,
    /// Extension of the original file, including the leading dot.
    pub file_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub storage_type: StorageType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created: Option<Date>,
    pub added: Date,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub correspondent: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub document_type: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub content: String,
    /// Path of the archive rendition relative to the archive root. `None` means
    /// the document has no archive rendition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub archive_filename: Option<String>,
    /// MD5 hex digest of the archive rendition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub archive_checksum: Option<String>,
}
impl Document {
    /// A document with no metadata beyond what every stored document has.
    pub fn new(id: u64, mime_type: impl Into<String>, file_type: impl Into<String>, added: Date) -> Self {
        Self {
            id,
            filename: None,
            mime_type: mime_type.into(),
            file_type: file_type.into(),
            storage_type: StorageType::Unencrypted,
            title: String::new(),
            created: None,
            added,
            tags: vec![],
            correspondent: None,
            document_type: None,
            content: String::new(),
            archive_filename: None,
            archive_checksum: None,
        }
    }

    /// The identifier as a fixed-width name, used whenever no template applies.
    pub fn padded_id(&self) -> String {
        format!("{:07}", self.id)
    }

    /// The name currently recorded for the given rendition.
    pub fn recorded_name(&self, role: Role) -> Option<&str> {
        match role {
            Role::Original => self.filename.as_deref(),
            Role::Archive => self.archive_filename.as_deref(),
        }
    }

    /// Marks the document as having no archive rendition at all.
    pub fn clear_archive(&mut self) {
        self.archive_filename = None;
        self.archive_checksum = None;
    }
}
