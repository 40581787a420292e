//! Stored document model and the on-disk layout of its files.
//!
//! A [`Document`] is owned by whatever system persists document metadata; the
//! rest of the workspace only reads it, except for `content`, `archive_filename`
//! and `archive_checksum` which are written back after archive regeneration.

mod checksum;
pub mod error;
mod layout;
mod model;
mod status;

pub use crate::checksum::md5_file;
pub use crate::layout::Layout;
pub use crate::model::{Document, GPG_EXTENSION, Role, StorageType};
pub use crate::status::ArchiveStatus;
