use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Converts one image file into another; the output format follows from the
/// output path's extension.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// ImageMagick.
#[derive(Debug, Clone)]
pub struct Magick {
    binary: PathBuf,
    timeout: Duration,
}
impl Magick {
    /// Searches the `PATH` for ImageMagick, preferring the version 7 entry
    /// point.
    pub fn discover(timeout: Duration) -> Result<Self> {
        for exe in ["magick", "convert"] {
            if let Ok(binary) = which::which(exe) {
                tracing::debug!(binary = %binary.display(), "Discovered image conversion tool");
                return Ok(Self { binary, timeout });
            }
        }
        tracing::info!("ImageMagick not found in PATH");
        exn::bail!(ErrorKind::ToolNotFound);
    }

    /// Uses the given executable (a name on the `PATH` or a path).
    pub fn with_binary(binary: &str, timeout: Duration) -> Result<Self> {
        let binary = which::which(binary).or_raise(|| ErrorKind::ToolNotFound)?;
        Ok(Self { binary, timeout })
    }

    /// Fixed conversion parameters: first frame only, bounded to 500 pixels
    /// wide (height effectively unbounded), flattened, stripped of metadata
    /// and rotated upright. No trimming.
    fn arguments(input: &Path, output: &Path) -> Vec<OsString> {
        let mut first_frame = input.as_os_str().to_owned();
        first_frame.push("[0]");
        let mut args: Vec<OsString> = ["-density", "300", "-scale", "500x5000>", "-alpha", "remove", "-strip", "-auto-orient"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(first_frame);
        args.push(output.as_os_str().to_owned());
        args
    }
}
impl Converter for Magick {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let mut log = tempfile::tempfile().or_raise(|| ErrorKind::Io)?;
        let stderr = log.try_clone().or_raise(|| ErrorKind::Io)?;
        let mut child = Command::new(&self.binary)
            .args(Self::arguments(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .or_raise(|| ErrorKind::Io)?;
        let Some(status) = child.wait_timeout(self.timeout).or_raise(|| ErrorKind::Io)? else {
            child.kill().or_raise(|| ErrorKind::Io)?;
            child.wait().or_raise(|| ErrorKind::Io)?;
            exn::bail!(ErrorKind::Timeout(self.timeout));
        };
        if !status.success() {
            let mut message = String::new();
            if log.seek(SeekFrom::Start(0)).is_ok() {
                // Lossy: ImageMagick may echo non-UTF-8 filenames back.
                let mut bytes = vec![];
                if log.read_to_end(&mut bytes).is_ok() {
                    message = String::from_utf8_lossy(&bytes).trim().to_string();
                }
            }
            exn::bail!(ErrorKind::ConversionFailed(format!("{status}: {message}")));
        }
        Ok(())
    }
}
