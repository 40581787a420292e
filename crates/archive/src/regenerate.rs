use crate::error::{ErrorKind, Result};
use crate::parser::{DocumentStore, ParserFactory, ParserGuard};
use crate::retry::{Attempt, RetryPolicy, Sleeper, ThreadSleeper};
use archivist_document::{ArchiveStatus, Document, Layout, Role, md5_file};
use archivist_naming::{Claim, FilenameGenerator, UniqueNameResolver};
use derive_more::Display;
use exn::ResultExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;

/// How regeneration of a single document ended.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Outcome {
    /// The parser produced an archive, now installed under `filename`.
    #[display("archived as {filename}")]
    Archived { filename: String, checksum: String },
    /// The parser succeeded but produced no archive file.
    #[display("no archive produced")]
    NoArtifact,
    /// Every attempt failed; the document no longer claims an archive.
    #[display("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

enum Step {
    Done(Outcome),
    Retry(Attempt),
}

/// Re-runs the parser over a document's original and installs the archive
/// rendition it produces.
pub struct ArchiveRegenerator<'a> {
    layout: &'a Layout,
    generator: &'a FilenameGenerator,
    parsers: &'a dyn ParserFactory,
    store: &'a dyn DocumentStore,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
}
impl<'a> ArchiveRegenerator<'a> {
    pub fn new(
        layout: &'a Layout,
        generator: &'a FilenameGenerator,
        parsers: &'a dyn ParserFactory,
        store: &'a dyn DocumentStore,
    ) -> Self {
        Self {
            layout,
            generator,
            parsers,
            store,
            sleeper: &ThreadSleeper,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Parses the document again and records the result.
    ///
    /// Parse failures are retried up to the policy's limit, sleeping for the
    /// backoff in between; once exhausted the document is saved without an
    /// archive and [`Outcome::Exhausted`] is returned. Any other failure
    /// (missing original, copying the archive, saving) is returned as an
    /// error and leaves both `doc` and the stored record untouched.
    ///
    /// The parsed text replaces `content` only when a parse succeeds.
    #[instrument(skip_all, fields(document_id = doc.id))]
    pub fn regenerate(&self, doc: &mut Document) -> Result<Outcome> {
        let status = match ArchiveStatus::inspect(self.layout, doc) {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::warn!(error = ?err, "Could not inspect current archive, it will be left in place");
                None
            },
        };
        self.run(doc, status)
    }

    /// Regenerates only when the current archive is missing, stale, or still
    /// sitting under its legacy name. Returns `None` when nothing was done.
    #[instrument(skip_all, fields(document_id = doc.id))]
    pub fn regenerate_if_needed(&self, doc: &mut Document) -> Result<Option<Outcome>> {
        let status = ArchiveStatus::inspect(self.layout, doc).or_raise(|| ErrorKind::Inspect)?;
        if !status.needs_regeneration() {
            tracing::debug!(status = ?status, "Archive is up to date");
            return Ok(None);
        }
        tracing::info!(status = ?status, "Archive needs regenerating");
        self.run(doc, Some(status)).map(Some)
    }

    fn run(&self, doc: &mut Document, status: Option<ArchiveStatus>) -> Result<Outcome> {
        let source = self.layout.source_path(doc);
        if !source.is_file() {
            tracing::error!(path = %source.display(), "Original file not found, cannot regenerate archive");
            exn::bail!(ErrorKind::SourceMissing(source));
        }
        let display_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let owned = self.owned_archive(doc, status);

        let mut attempt = Attempt::first(&self.policy);
        loop {
            match self.attempt(doc, &source, &display_name, owned.as_deref(), attempt)? {
                Step::Done(outcome) => {
                    tracing::info!(outcome = %outcome, "Archive regeneration finished");
                    return Ok(outcome);
                },
                Step::Retry(next) => {
                    self.sleeper.sleep(self.policy.backoff);
                    attempt = next;
                },
            }
        }
    }

    /// The archive file on disk that provably belongs to `doc`: the recorded
    /// one when its checksum still matches, or the legacy one. Only this file
    /// may be replaced or removed; any other file at the recorded name could
    /// have been claimed by another document since.
    fn owned_archive(&self, doc: &Document, status: Option<ArchiveStatus>) -> Option<PathBuf> {
        match status? {
            ArchiveStatus::Present => self.layout.archive_path(doc),
            ArchiveStatus::Legacy(path) => Some(path),
            _ => None,
        }
    }

    /// One pass through the parser. The guard is dropped (and the parser
    /// cleaned up) before this returns, so before any backoff.
    fn attempt(
        &self,
        doc: &mut Document,
        source: &Path,
        display_name: &str,
        owned: Option<&Path>,
        attempt: Attempt,
    ) -> Result<Step> {
        let mut parser = ParserGuard::acquire(self.parsers, &doc.mime_type)?;
        tracing::debug!(attempt = attempt.number(), "Parsing document");
        if let Err(err) = parser.parse(source, &doc.mime_type, display_name) {
            return match attempt.next() {
                Some(next) => {
                    tracing::warn!(
                        attempt = attempt.number(),
                        error = %err,
                        "Parse error, will try again in {} seconds",
                        self.policy.backoff.as_secs(),
                    );
                    Ok(Step::Retry(next))
                },
                None => {
                    tracing::error!(
                        attempts = attempt.number(),
                        error = %err,
                        "Unable to regenerate archive, manual intervention required",
                    );
                    let mut updated = doc.clone();
                    updated.clear_archive();
                    self.save(&updated)?;
                    *doc = updated;
                    Ok(Step::Done(Outcome::Exhausted { attempts: attempt.number() }))
                },
            };
        }

        let mut updated = doc.clone();
        updated.content = parser.text();
        let outcome = match parser.archive_path().filter(|path| path.is_file()) {
            Some(artifact) => self.install(&mut updated, &artifact, owned)?,
            None => {
                tracing::error!("Parser did not produce an archive file");
                updated.clear_archive();
                self.save(&updated)?;
                Outcome::NoArtifact
            },
        };
        *doc = updated;
        Ok(Step::Done(outcome))
    }

    /// Points the document at a collision-free copy of `artifact` in the
    /// archive root.
    ///
    /// The copy is staged next to its destination and only renamed into place
    /// once the document has been saved, so a failed save leaves no
    /// unrecorded file behind and never changes a recorded one.
    fn install(&self, doc: &mut Document, artifact: &Path, owned: Option<&Path>) -> Result<Outcome> {
        let checksum = md5_file(artifact).or_raise(|| ErrorKind::ArtifactUnreadable(artifact.to_path_buf()))?;
        let held = owned
            .and_then(|path| path.strip_prefix(&self.layout.archive).ok())
            .and_then(Path::to_str);
        let claim = UniqueNameResolver::new(self.generator)
            .claim_holding(doc, &self.layout.archive, Role::Archive, held)
            .or_raise(|| ErrorKind::Naming)?;
        let destination = self.layout.archive.join(claim.name());
        let staged = match stage_copy(artifact, &destination) {
            Ok(staged) => staged,
            Err(err) => {
                release(&claim, &destination);
                return Err(err).or_raise(|| ErrorKind::Install(destination));
            },
        };

        doc.archive_filename = Some(claim.name().to_string());
        doc.archive_checksum = Some(checksum.clone());
        if let Err(err) = self.save(doc) {
            release(&claim, &destination);
            return Err(err);
        }
        if let Err(err) = staged.persist(&destination) {
            tracing::error!(path = %destination.display(), error = %err.error, "Archive recorded but could not be moved into place");
            release(&claim, &destination);
            return Err(err.error).or_raise(|| ErrorKind::Install(destination));
        }
        let filename = claim.into_name();
        tracing::debug!(filename = %filename, checksum = %checksum, "Archive installed");

        if let Some(owned) = owned
            && owned != destination
        {
            remove_superseded(owned);
        }
        Ok(Outcome::Archived { filename, checksum })
    }

    fn save(&self, doc: &Document) -> Result<()> {
        self.store.save(doc).or_raise(|| ErrorKind::Store)
    }
}

/// Copies `artifact` into a temporary file next to `destination`, ready to be
/// renamed over it.
fn stage_copy(artifact: &Path, destination: &Path) -> io::Result<NamedTempFile> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    io::copy(&mut File::open(artifact)?, &mut staged)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Gives back a name reserved by [`UniqueNameResolver::claim_holding`].
fn release(claim: &Claim, destination: &Path) {
    if let Claim::Reserved(_) = claim
        && let Err(err) = fs::remove_file(destination)
    {
        tracing::warn!(path = %destination.display(), error = %err, "Could not remove reserved archive name");
    }
}

fn remove_superseded(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed superseded archive"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {},
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "Could not remove superseded archive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseErrorKind, ParseResult};
    use crate::parser::Parser;
    use archivist_naming::Sanitizer;
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use time::{Date, Month};

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[derive(Clone, Copy)]
    enum Behaviour {
        Fail,
        Text(&'static str),
        Archive(&'static str, &'static [u8]),
    }

    #[derive(Default)]
    struct Script {
        behaviours: Mutex<VecDeque<Behaviour>>,
        parses: AtomicUsize,
        cleanups: AtomicUsize,
    }
    impl Script {
        fn new(behaviours: impl IntoIterator<Item = Behaviour>) -> Arc<Self> {
            Arc::new(Self {
                behaviours: Mutex::new(behaviours.into_iter().collect()),
                ..Self::default()
            })
        }
    }

    struct ScriptedParser {
        script: Arc<Script>,
        workdir: Option<TempDir>,
        text: String,
        archive: Option<PathBuf>,
    }
    impl Parser for ScriptedParser {
        fn parse(&mut self, source: &Path, _: &str, _: &str) -> ParseResult<()> {
            assert!(source.is_file());
            self.script.parses.fetch_add(1, Ordering::SeqCst);
            let behaviour = self.script.behaviours.lock().unwrap().pop_front().unwrap_or(Behaviour::Fail);
            match behaviour {
                Behaviour::Fail => Err(ParseErrorKind::Failed("service unavailable".to_string()).into()),
                Behaviour::Text(text) => {
                    self.text = text.to_string();
                    Ok(())
                },
                Behaviour::Archive(text, bytes) => {
                    let workdir = tempfile::tempdir().unwrap();
                    let path = workdir.path().join("archive.pdf");
                    fs::write(&path, bytes).unwrap();
                    self.workdir = Some(workdir);
                    self.archive = Some(path);
                    self.text = text.to_string();
                    Ok(())
                },
            }
        }

        fn text(&self) -> String {
            self.text.clone()
        }

        fn archive_path(&self) -> Option<PathBuf> {
            self.archive.clone()
        }

        fn cleanup(&mut self) {
            self.script.cleanups.fetch_add(1, Ordering::SeqCst);
            self.workdir = None;
        }
    }

    fn factory(script: &Arc<Script>) -> impl ParserFactory + use<> {
        let script = script.clone();
        move |_: &str| -> Result<Box<dyn crate::Parser>> {
            Ok(Box::new(ScriptedParser {
                script: script.clone(),
                workdir: None,
                text: String::new(),
                archive: None,
            }))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<Document>>,
        fail: bool,
    }
    impl DocumentStore for MemoryStore {
        fn save(&self, doc: &Document) -> Result<()> {
            if self.fail {
                exn::bail!(ErrorKind::Store);
            }
            self.saved.lock().unwrap().push(doc.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }
    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    struct Fixture {
        _dir: TempDir,
        layout: Layout,
        doc: Document,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::under(dir.path());
        fs::create_dir_all(&layout.originals).unwrap();
        fs::write(layout.originals.join("statement.pdf"), b"%PDF-1.7 original").unwrap();
        let added = Date::from_calendar_date(2023, Month::June, 1).unwrap();
        let mut doc = Document::new(1, "application/pdf", ".pdf", added);
        doc.title = "Statement".to_string();
        doc.filename = Some("statement.pdf".to_string());
        doc.content = "old content".to_string();
        doc.archive_filename = Some("0000001.pdf".to_string());
        doc.archive_checksum = Some("0123456789abcdef0123456789abcdef".to_string());
        Fixture { _dir: dir, layout, doc }
    }

    #[test]
    fn test_exhausts_attempts_and_clears_checksum() {
        let mut f = fixture();
        let script = Script::new([Behaviour::Fail, Behaviour::Fail, Behaviour::Fail]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let sleeper = RecordingSleeper::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store).with_sleeper(&sleeper);

        let outcome = regenerator.regenerate(&mut f.doc).unwrap();

        assert_eq!(outcome, Outcome::Exhausted { attempts: 3 });
        assert_eq!(script.parses.load(Ordering::SeqCst), 3);
        assert_eq!(script.cleanups.load(Ordering::SeqCst), 3);
        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_secs(5); 2]);
        assert_eq!(f.doc.archive_checksum, None);
        assert_eq!(f.doc.archive_filename, None);
        assert_eq!(f.doc.content, "old content");
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_policy() {
        let mut f = fixture();
        let script = Script::new([]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let sleeper = RecordingSleeper::default();
        let generator = FilenameGenerator::default();
        let policy = RetryPolicy { max_attempts: 5, backoff: Duration::from_millis(10) };
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store)
            .with_policy(policy)
            .with_sleeper(&sleeper);

        assert_eq!(regenerator.regenerate(&mut f.doc).unwrap(), Outcome::Exhausted { attempts: 5 });
        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_millis(10); 4]);
    }

    #[test]
    fn test_success_after_retry() {
        let mut f = fixture();
        f.doc.archive_filename = None;
        f.doc.archive_checksum = None;
        let script = Script::new([Behaviour::Fail, Behaviour::Archive("fresh text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let sleeper = RecordingSleeper::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store).with_sleeper(&sleeper);

        let outcome = regenerator.regenerate(&mut f.doc).unwrap();

        assert_eq!(
            outcome,
            Outcome::Archived {
                filename: "0000001.pdf".to_string(),
                checksum: HELLO_MD5.to_string(),
            }
        );
        assert_eq!(sleeper.slept.lock().unwrap().len(), 1);
        assert_eq!(script.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read(f.layout.archive.join("0000001.pdf")).unwrap(), b"hello world");
        assert_eq!(f.doc.archive_filename.as_deref(), Some("0000001.pdf"));
        assert_eq!(f.doc.archive_checksum.as_deref(), Some(HELLO_MD5));
        assert_eq!(f.doc.content, "fresh text");
        assert_eq!(store.saved.lock().unwrap().last(), Some(&f.doc));
    }

    #[test]
    fn test_no_artifact() {
        let mut f = fixture();
        let script = Script::new([Behaviour::Text("only text")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let sleeper = RecordingSleeper::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store).with_sleeper(&sleeper);

        assert_eq!(regenerator.regenerate(&mut f.doc).unwrap(), Outcome::NoArtifact);
        assert_eq!(script.parses.load(Ordering::SeqCst), 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
        assert_eq!(f.doc.archive_checksum, None);
        assert_eq!(f.doc.archive_filename, None);
        assert_eq!(f.doc.content, "only text");
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_overwrites_recorded_archive_in_place() {
        let mut f = fixture();
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"stale").unwrap();
        let script = Script::new([Behaviour::Archive("text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        regenerator.regenerate(&mut f.doc).unwrap();

        assert_eq!(f.doc.archive_filename.as_deref(), Some("0000001.pdf"));
        assert_eq!(fs::read(f.layout.archive.join("0000001.pdf")).unwrap(), b"hello world");
        assert!(!f.layout.archive.join("0000001_01.pdf").exists());
    }

    #[test]
    fn test_renamed_archive_replaces_previous_file() {
        let mut f = fixture();
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"hello world").unwrap();
        f.doc.archive_checksum = Some(HELLO_MD5.to_string());
        // Someone else's archive already holds the preferred name.
        fs::write(f.layout.archive.join("Statement.pdf"), b"other document").unwrap();
        let script = Script::new([Behaviour::Archive("text", b"fresh archive")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::new(Some("{title}".to_string()), Sanitizer::default());
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        regenerator.regenerate(&mut f.doc).unwrap();

        assert_eq!(f.doc.archive_filename.as_deref(), Some("Statement_01.pdf"));
        assert_eq!(fs::read(f.layout.archive.join("Statement_01.pdf")).unwrap(), b"fresh archive");
        assert_eq!(fs::read(f.layout.archive.join("Statement.pdf")).unwrap(), b"other document");
        assert!(!f.layout.archive.join("0000001.pdf").exists());
    }

    #[test]
    fn test_previous_name_taken_over_by_another_document_is_kept() {
        let mut f = fixture();
        // Our archive went missing and another document was archived under
        // the freed name; its bytes don't match our recorded checksum.
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"other document").unwrap();
        let script = Script::new([Behaviour::Archive("text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::new(Some("{title}".to_string()), Sanitizer::default());
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        regenerator.regenerate(&mut f.doc).unwrap();

        assert_eq!(f.doc.archive_filename.as_deref(), Some("Statement.pdf"));
        assert_eq!(fs::read(f.layout.archive.join("Statement.pdf")).unwrap(), b"hello world");
        assert_eq!(fs::read(f.layout.archive.join("0000001.pdf")).unwrap(), b"other document");
    }

    fn archive_listing(layout: &Layout) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(&layout.archive)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_legacy_archive_is_overwritten_under_same_name() {
        let mut f = fixture();
        f.doc.filename = None;
        f.doc.archive_filename = None;
        f.doc.archive_checksum = None;
        fs::write(f.layout.originals.join("0000001.pdf"), b"%PDF-1.7 original").unwrap();
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"legacy").unwrap();
        let script = Script::new([Behaviour::Archive("text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        let outcome = regenerator.regenerate_if_needed(&mut f.doc).unwrap();

        assert_eq!(
            outcome,
            Some(Outcome::Archived {
                filename: "0000001.pdf".to_string(),
                checksum: HELLO_MD5.to_string(),
            })
        );
        assert_eq!(archive_listing(&f.layout), ["0000001.pdf"]);
        assert_eq!(fs::read(f.layout.archive.join("0000001.pdf")).unwrap(), b"hello world");
    }

    #[test]
    fn test_legacy_archive_is_removed_after_rename() {
        let mut f = fixture();
        f.doc.archive_filename = None;
        f.doc.archive_checksum = None;
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("statement.pdf"), b"legacy").unwrap();
        let script = Script::new([Behaviour::Archive("text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        regenerator.regenerate_if_needed(&mut f.doc).unwrap();

        assert_eq!(f.doc.archive_filename.as_deref(), Some("0000001.pdf"));
        assert_eq!(archive_listing(&f.layout), ["0000001.pdf"]);
    }

    #[test]
    fn test_missing_original_is_fatal() {
        let mut f = fixture();
        fs::remove_file(f.layout.originals.join("statement.pdf")).unwrap();
        let script = Script::new([Behaviour::Text("unused")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        let err = regenerator.regenerate(&mut f.doc).unwrap_err();
        assert!(matches!(&*err, ErrorKind::SourceMissing(_)));
        assert_eq!(script.parses.load(Ordering::SeqCst), 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[rstest]
    #[case::no_artifact(Behaviour::Text("text"))]
    #[case::new_archive(Behaviour::Archive("text", b"hello world"))]
    fn test_store_failure_is_fatal(#[case] behaviour: Behaviour) {
        let mut f = fixture();
        f.doc.archive_filename = None;
        f.doc.archive_checksum = None;
        let before = f.doc.clone();
        let script = Script::new([behaviour]);
        let parsers = factory(&script);
        let store = MemoryStore { fail: true, ..MemoryStore::default() };
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        let err = regenerator.regenerate(&mut f.doc).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Store));
        assert_eq!(script.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(f.doc, before);
        // No unrecorded archive (or staging file) is left behind.
        if f.layout.archive.exists() {
            assert!(archive_listing(&f.layout).is_empty());
        }
    }

    #[test]
    fn test_store_failure_keeps_recorded_archive() {
        let mut f = fixture();
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"stale").unwrap();
        let before = f.doc.clone();
        let script = Script::new([Behaviour::Archive("text", b"hello world")]);
        let parsers = factory(&script);
        let store = MemoryStore { fail: true, ..MemoryStore::default() };
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        assert!(regenerator.regenerate(&mut f.doc).is_err());
        assert_eq!(f.doc, before);
        assert_eq!(fs::read(f.layout.archive.join("0000001.pdf")).unwrap(), b"stale");
        assert_eq!(archive_listing(&f.layout), ["0000001.pdf"]);
    }

    #[test]
    fn test_regenerate_if_needed_skips_current_archive() {
        let mut f = fixture();
        fs::create_dir_all(&f.layout.archive).unwrap();
        fs::write(f.layout.archive.join("0000001.pdf"), b"hello world").unwrap();
        f.doc.archive_checksum = Some(HELLO_MD5.to_string());
        let script = Script::new([Behaviour::Text("unused")]);
        let parsers = factory(&script);
        let store = MemoryStore::default();
        let generator = FilenameGenerator::default();
        let regenerator = ArchiveRegenerator::new(&f.layout, &generator, &parsers, &store);

        assert_eq!(regenerator.regenerate_if_needed(&mut f.doc).unwrap(), None);
        assert_eq!(script.parses.load(Ordering::SeqCst), 0);

        fs::write(f.layout.archive.join("0000001.pdf"), b"tampered").unwrap();
        let outcome = regenerator.regenerate_if_needed(&mut f.doc).unwrap();
        assert_eq!(outcome, Some(Outcome::NoArtifact));
    }
}
