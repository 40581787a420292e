//! Layered configuration: built-in defaults, then an optional file (TOML, YAML
//! or JSON), then `ARCHIVIST_` environment variables, with `__` separating
//! nested keys (`ARCHIVIST_ARCHIVE__MAX_ATTEMPTS=5`).

pub mod error;
mod load;
mod model;

pub use crate::load::{ENV_PREFIX, default_path};
pub use crate::model::{ArchiveConfig, Config, FilenameConfig, ParserConfig, PathsConfig, ThumbnailConfig};
