use archivist_archive::RetryPolicy;
use archivist_document::Layout;
use archivist_naming::{DEFAULT_REPLACEMENT, FilenameGenerator, Sanitizer};
use archivist_thumbnail::PoolOptions;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const APPLICATION: &str = "archivist";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub filename: FilenameConfig,
    pub archive: ArchiveConfig,
    pub thumbnails: ThumbnailConfig,
}
impl Config {
    pub fn layout(&self) -> Layout {
        Layout::new(&self.paths.originals, &self.paths.archive, &self.paths.thumbnails)
    }

    pub fn filename_generator(&self) -> FilenameGenerator {
        FilenameGenerator::new(self.filename.format.clone(), Sanitizer::new(&self.filename.replacement))
    }
}

/// Directory roots. Relative paths are taken relative to the working
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub originals: PathBuf,
    pub archive: PathBuf,
    pub thumbnails: PathBuf,
}
impl Default for PathsConfig {
    fn default() -> Self {
        let media = ProjectDirs::from("", "", APPLICATION)
            .map_or_else(|| PathBuf::from("media"), |dirs| dirs.data_dir().join("media"));
        let layout = Layout::under(media);
        Self {
            originals: layout.originals,
            archive: layout.archive,
            thumbnails: layout.thumbnails,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameConfig {
    /// Template for stored filenames, e.g. `{created_year}/{correspondent}/{title}`.
    /// Unset means files are named after their padded identifier.
    pub format: Option<String>,
    /// Substituted for characters that can't appear in a filename.
    pub replacement: String,
}
impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            format: None,
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub parser: ParserConfig,
}
impl Default for ArchiveConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_secs: policy.backoff.as_secs(),
            parser: ParserConfig::default(),
        }
    }
}
impl ArchiveConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }
}

/// External program producing archive renditions. Arguments may use the
/// `{input}`, `{output}`, `{sidecar}`, `{mime_type}` and `{display_name}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}
impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            program: "ocrmypdf".to_string(),
            args: ["--skip-text", "--sidecar", "{sidecar}", "{input}", "{output}"]
                .map(String::from)
                .to_vec(),
            timeout_secs: 600,
        }
    }
}
impl ParserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub workers: usize,
    pub max_tasks_per_worker: usize,
    pub legacy_extension: String,
    pub target_extension: String,
    /// Per-image limit for the conversion tool.
    pub timeout_secs: u64,
    /// ImageMagick executable; searched for on the `PATH` when unset.
    pub binary: Option<String>,
}
impl Default for ThumbnailConfig {
    fn default() -> Self {
        let options = PoolOptions::default();
        Self {
            workers: options.workers,
            max_tasks_per_worker: options.max_tasks_per_worker,
            legacy_extension: options.legacy_extension,
            target_extension: options.target_extension,
            timeout_secs: 60,
            binary: None,
        }
    }
}
impl ThumbnailConfig {
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            workers: self.workers,
            max_tasks_per_worker: self.max_tasks_per_worker,
            legacy_extension: self.legacy_extension.clone(),
            target_extension: self.target_extension.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
