use crate::error::{ErrorKind, Result};
use crate::model::{APPLICATION, Config};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "ARCHIVIST_";

/// Where the configuration file is looked for when none is given, e.g.
/// `~/.config/archivist/config.toml` on Linux.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Loads and validates the configuration.
    ///
    /// An explicitly given file must exist; the default file is only used if
    /// it does.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.is_file()),
        };
        match &file {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file, using defaults and environment"),
        }
        let figment = Self::figment(file.as_deref())?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Defaults layered under `file`, without the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let Some(path) = file else {
            return Ok(figment);
        };
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the components can't work with.
    ///
    /// A filename format that doesn't parse is accepted here; the generator
    /// reports it once, the first time it names a document.
    pub fn validate(&self) -> Result<()> {
        let mut problems = vec![];
        if self.archive.max_attempts == 0 {
            problems.push("archive.max_attempts must be at least 1");
        }
        if self.archive.parser.program.trim().is_empty() {
            problems.push("archive.parser.program must not be empty");
        }
        if self.thumbnails.workers == 0 {
            problems.push("thumbnails.workers must be at least 1");
        }
        if self.thumbnails.max_tasks_per_worker == 0 {
            problems.push("thumbnails.max_tasks_per_worker must be at least 1");
        }
        if self.thumbnails.legacy_extension.trim_start_matches('.').is_empty() {
            problems.push("thumbnails.legacy_extension must not be empty");
        }
        if self.thumbnails.target_extension.trim_start_matches('.').is_empty() {
            problems.push("thumbnails.target_extension must not be empty");
        }
        if self.archive.parser.timeout_secs == 0 {
            problems.push("archive.parser.timeout_secs must be at least 1");
        }
        if self.thumbnails.timeout_secs == 0 {
            problems.push("thumbnails.timeout_secs must be at least 1");
        }
        if !problems.is_empty() {
            exn::bail!(ErrorKind::Invalid(problems.join("; ")));
        }
        Ok(())
    }
}
