//! Collision-free filenames.
//!
//! A document's preferred filename is whatever its template renders to. When
//! another file already occupies that name, a two-digit counter is appended
//! (`name_01.pdf`, `name_02.pdf`, …) until a free slot turns up. The name the
//! document already holds is always acceptable, so resolving an unchanged
//! document again never renames it.

use crate::error::{ErrorKind, Result};
use crate::template::FilenameGenerator;
use archivist_document::{Document, Role};
use exn::ResultExt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::instrument;

/// A filename secured by [`UniqueNameResolver::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The document already holds this name (recorded, or known to be its
    /// own); nothing was created.
    Recorded(String),
    /// An empty placeholder file was created under this name. The caller owns
    /// it and must either fill it or remove it.
    Reserved(String),
}
impl Claim {
    pub fn name(&self) -> &str {
        match self {
            Claim::Recorded(name) | Claim::Reserved(name) => name,
        }
    }

    pub fn into_name(self) -> String {
        match self {
            Claim::Recorded(name) | Claim::Reserved(name) => name,
        }
    }
}

/// Searches for a filename that doesn't collide with any other document's.
pub struct UniqueNameResolver<'a> {
    generator: &'a FilenameGenerator,
}
impl<'a> UniqueNameResolver<'a> {
    pub fn new(generator: &'a FilenameGenerator) -> Self {
        Self { generator }
    }

    /// Resolves the filename for `doc`'s `role` rendition inside `directory`.
    ///
    /// For each counter value, starting at zero:
    /// 1. the document's currently recorded name for `role` is returned as is;
    /// 2. a name with nothing at `directory/name` is returned;
    /// 3. otherwise the counter is incremented.
    ///
    /// This only checks for existence. Two callers resolving the same name at
    /// the same time can both be told it is free; use [`claim`](Self::claim)
    /// when that matters.
    #[instrument(skip_all, fields(document_id = doc.id, role = %role))]
    pub fn resolve(&self, doc: &Document, directory: &Path, role: Role) -> String {
        let candidate = self.generator.render(doc);
        self.resolve_candidate(doc, directory, &candidate, role, 0)
    }

    /// [`resolve`](Self::resolve) for an already rendered candidate path,
    /// starting the counter at `counter_start`.
    pub fn resolve_candidate(
        &self,
        doc: &Document,
        directory: &Path,
        candidate: &str,
        role: Role,
        counter_start: u32,
    ) -> String {
        let recorded = doc.recorded_name(role);
        let mut counter = counter_start;
        loop {
            let name = self.generator.filename_from(candidate, doc, counter, role);
            if recorded == Some(name.as_str()) {
                return name;
            }
            if !directory.join(&name).exists() {
                return name;
            }
            tracing::trace!(name = %name, "Filename taken, trying next counter");
            counter = counter.saturating_add(1);
        }
    }

    /// Like [`resolve`](Self::resolve), but atomically reserves the name by
    /// creating an empty file there (and any missing parent directories).
    ///
    /// Creation is exclusive, so of two concurrent callers racing for the same
    /// name exactly one wins; the other moves on to the next counter.
    pub fn claim(&self, doc: &Document, directory: &Path, role: Role) -> Result<Claim> {
        self.claim_holding(doc, directory, role, None)
    }

    /// [`claim`](Self::claim) where `held` is one more name in `directory`
    /// known to belong to `doc` although it isn't recorded, such as an archive
    /// still sitting under its legacy name. It is reused like the recorded one.
    #[instrument(skip_all, fields(document_id = doc.id, role = %role))]
    pub fn claim_holding(&self, doc: &Document, directory: &Path, role: Role, held: Option<&str>) -> Result<Claim> {
        let candidate = self.generator.render(doc);
        let recorded = doc.recorded_name(role);
        let mut counter = 0;
        loop {
            let name = self.generator.filename_from(&candidate, doc, counter, role);
            if recorded == Some(name.as_str()) || held == Some(name.as_str()) {
                return Ok(Claim::Recorded(name));
            }
            let path = directory.join(&name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).or_raise(|| ErrorKind::InvalidPath(parent.to_path_buf()))?;
            }
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Claim::Reserved(name)),
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                    tracing::trace!(name = %name, "Filename taken, trying next counter");
                    counter = counter.saturating_add(1);
                },
                Err(e) => return Err(e).or_raise(|| ErrorKind::InvalidPath(path)),
            }
        }
    }
}
