//! Keeping rendered paths inside the directory they are resolved against.
//!
//! Field values are sanitized before substitution, so any separator in a
//! rendered path comes from the format itself. Formats may build a hierarchy
//! (`{created_year}/{title}`), but must never climb out of the root.

use crate::error::{ErrorKind, Result};
use std::path::PathBuf;

/// Collapses empty, `.` and `..` segments of a relative candidate path and
/// joins what is left with `/`.
///
/// Both `/` and `\` separate segments. A `..` with nothing left to pop, a NUL
/// byte, or a path with no segments at all is an error.
pub(crate) fn normalize(candidate: &str) -> Result<String> {
    let invalid = || ErrorKind::InvalidPath(PathBuf::from(candidate));
    let mut segments: Vec<&str> = vec![];
    for segment in candidate.split(['/', '\\']) {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            // Would truncate the name in C-based syscalls.
            s if s.contains('\0') => exn::bail!(invalid()),
            s => segments.push(s),
        }
    }
    exn::ensure!(!segments.is_empty(), invalid());
    Ok(segments.join("/"))
}
