//! Parsing through an external program, such as `ocrmypdf`.
//!
//! The program is called once per attempt with its arguments expanded from a
//! template. Each call gets its own scratch directory:
//!
//! | Placeholder      | Expands to                                       |
//! |------------------|--------------------------------------------------|
//! | `{input}`        | the original file                                |
//! | `{output}`       | where the archive PDF should be written          |
//! | `{sidecar}`      | where the extracted text should be written       |
//! | `{mime_type}`    | the document's MIME type                         |
//! | `{display_name}` | the original's filename, for the program's logs  |

use crate::error::{ErrorKind, ParseErrorKind, ParseResult, Result};
use crate::parser::{Parser, ParserFactory};
use exn::ResultExt;
use std::fs::{self, File};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

const OUTPUT_NAME: &str = "archive.pdf";
const SIDECAR_NAME: &str = "sidecar.txt";
const LOG_NAME: &str = "parser.log";

/// Creates [`CommandParser`]s for every MIME type.
#[derive(Debug, Clone)]
pub struct CommandParserFactory {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}
impl CommandParserFactory {
    /// Looks `program` up on the `PATH` (or takes it as is when it's a path).
    pub fn discover(program: &str, args: Vec<String>, timeout: Duration) -> Result<Self> {
        let resolved = which::which(program).or_raise(|| ErrorKind::ProgramNotFound(program.to_string()))?;
        tracing::debug!(program = %resolved.display(), "Discovered parser program");
        Ok(Self { program: resolved, args, timeout })
    }
}
impl ParserFactory for CommandParserFactory {
    fn create(&self, _mime_type: &str) -> Result<Box<dyn Parser>> {
        Ok(Box::new(CommandParser {
            program: self.program.clone(),
            args: self.args.clone(),
            timeout: self.timeout,
            workdir: None,
            text: String::new(),
            archive: None,
        }))
    }
}

/// A single run of the external program.
pub struct CommandParser {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    workdir: Option<TempDir>,
    text: String,
    archive: Option<PathBuf>,
}
impl CommandParser {
    fn expand(&self, workdir: &Path, source: &Path, mime_type: &str, display_name: &str) -> Vec<String> {
        let input = source.to_string_lossy();
        let output = workdir.join(OUTPUT_NAME);
        let output = output.to_string_lossy();
        let sidecar = workdir.join(SIDECAR_NAME);
        let sidecar = sidecar.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{sidecar}", &sidecar)
                    .replace("{mime_type}", mime_type)
                    .replace("{display_name}", display_name)
            })
            .collect()
    }
}
impl Parser for CommandParser {
    fn parse(&mut self, source: &Path, mime_type: &str, display_name: &str) -> ParseResult<()> {
        let workdir = tempfile::Builder::new()
            .prefix("archivist-parse-")
            .tempdir()
            .map_err(ParseErrorKind::Io)?;
        let args = self.expand(workdir.path(), source, mime_type, display_name);
        let log = workdir.path().join(LOG_NAME);
        let stderr = File::create(&log).map_err(ParseErrorKind::Io)?;

        tracing::debug!(program = %self.program.display(), args = ?args, "Running parser");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(ParseErrorKind::Io)?;
        let Some(status) = child.wait_timeout(self.timeout).map_err(ParseErrorKind::Io)? else {
            tracing::warn!(timeout = ?self.timeout, "Parser timed out, killing it");
            child.kill().map_err(ParseErrorKind::Io)?;
            child.wait().map_err(ParseErrorKind::Io)?;
            exn::bail!(ParseErrorKind::Timeout(self.timeout));
        };
        if !status.success() {
            let output = fs::read_to_string(&log).unwrap_or_default();
            let last_line = output.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or_default();
            exn::bail!(ParseErrorKind::Failed(format!("{status}: {}", last_line.trim())));
        }

        self.text = match fs::read_to_string(workdir.path().join(SIDECAR_NAME)) {
            Ok(text) => text,
            Err(err) if err.kind() == IoErrorKind::NotFound => String::new(),
            Err(err) => exn::bail!(ParseErrorKind::Io(err)),
        };
        let output = workdir.path().join(OUTPUT_NAME);
        self.archive = output.is_file().then_some(output);
        self.workdir = Some(workdir);
        Ok(())
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn archive_path(&self) -> Option<PathBuf> {
        self.archive.clone()
    }

    fn cleanup(&mut self) {
        self.archive = None;
        if let Some(workdir) = self.workdir.take() {
            let path = workdir.path().to_path_buf();
            if let Err(err) = workdir.close() {
                tracing::warn!(path = %path.display(), error = %err, "Could not remove parser scratch directory");
            }
        }
    }
}
