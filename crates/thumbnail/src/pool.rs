use crate::converter::Converter;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, File};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use std::vec::IntoIter;
use tempfile::NamedTempFile;
use tracing::instrument;

/// Upper bound on the default number of workers; the conversion tool is
/// itself multi-threaded.
const MAX_DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of workers converting at the same time.
    pub workers: usize,
    /// Items a worker thread handles before it is retired and replaced.
    pub max_tasks_per_worker: usize,
    /// Extension (without the dot) of the thumbnails to convert.
    pub legacy_extension: String,
    /// Extension (without the dot) they are converted to.
    pub target_extension: String,
}
impl Default for PoolOptions {
    fn default() -> Self {
        let parallelism = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            workers: parallelism.min(MAX_DEFAULT_WORKERS),
            max_tasks_per_worker: 4,
            legacy_extension: "png".to_string(),
            target_extension: "webp".to_string(),
        }
    }
}

/// One thumbnail to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The legacy thumbnail.
    pub source: PathBuf,
    /// Where the converter writes, inside the batch's scratch directory.
    pub target: PathBuf,
}
impl WorkItem {
    /// Final location of the converted thumbnail: next to the source.
    pub fn destination(&self) -> PathBuf {
        let parent = self.source.parent().unwrap_or_else(|| Path::new("."));
        match self.target.file_name() {
            Some(name) => parent.join(name),
            None => self.source.with_extension(self.target.extension().unwrap_or_default()),
        }
    }
}

/// Summary of a conversion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub converted: usize,
    pub failed: usize,
    /// Worker threads spawned over the whole batch, replacements included.
    pub workers_spawned: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Tally {
    converted: AtomicUsize,
    failed: AtomicUsize,
    workers_spawned: AtomicUsize,
}

type Queue = Mutex<IntoIter<WorkItem>>;

/// Lists the legacy thumbnails directly inside `cache_dir` (no recursion),
/// each paired with a target of the same name in `scratch_dir`.
///
/// The extension must match exactly: `a.png` and `a.PNG` would both convert
/// to `a.webp`.
pub fn discover(cache_dir: &Path, scratch_dir: &Path, options: &PoolOptions) -> Result<Vec<WorkItem>> {
    let legacy = options.legacy_extension.trim_start_matches('.');
    let target = options.target_extension.trim_start_matches('.');
    let entries = fs::read_dir(cache_dir).or_raise(|| ErrorKind::Scan(cache_dir.to_path_buf()))?;
    let mut items = vec![];
    for entry in entries {
        let path = entry.or_raise(|| ErrorKind::Scan(cache_dir.to_path_buf()))?.path();
        let matches = path.extension().is_some_and(|ext| ext == legacy);
        if !matches || !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = scratch_dir.join(name).with_extension(target);
        items.push(WorkItem { source: path, target });
    }
    items.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(items)
}

/// Converts every legacy thumbnail in `cache_dir`.
///
/// Items are shared out over `options.workers` slots. Each slot runs one
/// worker thread at a time; a worker retires after
/// `options.max_tasks_per_worker` items and the slot starts a fresh one while
/// work remains. A worker that panics only loses the item it was holding.
///
/// Only failing to scan `cache_dir` or to create the scratch directory is an
/// error. Per-item failures are logged and counted in the [`Report`].
#[instrument(skip_all, fields(cache_dir = %cache_dir.display()))]
pub fn convert_all(cache_dir: &Path, converter: &dyn Converter, options: &PoolOptions) -> Result<Report> {
    let started = Instant::now();
    let scratch = tempfile::Builder::new()
        .prefix("archivist-thumbnails-")
        .tempdir()
        .or_raise(|| ErrorKind::Scratch)?;
    let items = discover(cache_dir, scratch.path(), options)?;
    if items.is_empty() {
        tracing::debug!("No legacy thumbnails found");
        return Ok(Report { elapsed: started.elapsed(), ..Report::default() });
    }
    tracing::info!(
        count = items.len(),
        "Converting thumbnails from {} to {}, this may take a while",
        options.legacy_extension,
        options.target_extension,
    );

    let slots = options.workers.clamp(1, items.len());
    let tasks = options.max_tasks_per_worker.max(1);
    let queue: Queue = Mutex::new(items.into_iter());
    let tally = Tally::default();
    thread::scope(|scope| {
        let (queue, tally) = (&queue, &tally);
        for slot in 0..slots {
            scope.spawn(move || supervise(slot, queue, converter, tasks, tally));
        }
    });

    let report = Report {
        converted: tally.converted.into_inner(),
        failed: tally.failed.into_inner(),
        workers_spawned: tally.workers_spawned.into_inner(),
        elapsed: started.elapsed(),
    };
    if let Err(err) = scratch.close() {
        tracing::warn!(error = %err, "Could not remove thumbnail scratch directory");
    }
    tracing::info!(
        converted = report.converted,
        failed = report.failed,
        elapsed = ?report.elapsed,
        "Thumbnail conversion finished",
    );
    Ok(report)
}

/// Keeps one worker running in `slot` until the queue is drained.
fn supervise(slot: usize, queue: &Queue, converter: &dyn Converter, tasks: usize, tally: &Tally) {
    thread::scope(|scope| {
        while remaining(queue) > 0 {
            tally.workers_spawned.fetch_add(1, Ordering::Relaxed);
            let worker = scope.spawn(move || work(queue, converter, tasks, tally));
            if worker.join().is_err() {
                tracing::error!(slot, "Thumbnail worker panicked, replacing it");
                tally.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });
}

/// Handles at most `tasks` items, then returns.
fn work(queue: &Queue, converter: &dyn Converter, tasks: usize, tally: &Tally) {
    for _ in 0..tasks {
        let Some(item) = next(queue) else {
            return;
        };
        match convert_one(&item, converter) {
            Ok(()) => {
                tracing::debug!(path = %item.source.display(), "Thumbnail converted");
                tally.converted.fetch_add(1, Ordering::Relaxed);
            },
            Err(err) => {
                tracing::error!(path = %item.source.display(), error = ?err, "Error converting thumbnail, leaving it in place");
                tally.failed.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

fn next(queue: &Queue) -> Option<WorkItem> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).next()
}

fn remaining(queue: &Queue) -> usize {
    queue.lock().unwrap_or_else(PoisonError::into_inner).len()
}

/// Converts, installs the result next to the source, then removes the source.
/// The source is only touched once the converted copy is in place.
fn convert_one(item: &WorkItem, converter: &dyn Converter) -> Result<()> {
    converter.convert(&item.source, &item.target)?;
    let destination = item.destination();
    copy_into_place(&item.target, &destination).or_raise(|| ErrorKind::Install(destination.clone()))?;
    fs::remove_file(&item.source).or_raise(|| ErrorKind::Remove(item.source.clone()))?;
    Ok(())
}

fn copy_into_place(from: &Path, destination: &Path) -> io::Result<()> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(parent)?;
    io::copy(&mut File::open(from)?, &mut staged)?;
    staged.persist(destination).map_err(|err| err.error)?;
    Ok(())
}
