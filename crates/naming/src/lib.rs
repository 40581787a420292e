//! Filenames for stored documents: sanitized metadata rendered through a
//! configurable format, made unique within a directory.

pub mod error;
mod path;
mod sanitize;
mod template;
mod unique;

pub use crate::sanitize::{DEFAULT_REPLACEMENT, Sanitizer};
pub use crate::template::{FilenameGenerator, FilenameTemplate};
pub use crate::unique::{Claim, UniqueNameResolver};
