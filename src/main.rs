mod cli;
mod error;
mod store;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use crate::store::JsonStore;
use archivist_archive::{ArchiveRegenerator, CommandParserFactory};
use archivist_config::Config;
use archivist_document::{ArchiveStatus, Layout, Role};
use archivist_naming::UniqueNameResolver;
use archivist_thumbnail::{Magick, convert_all};
use clap::Parser;
use exn::ResultExt;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`); stdout is
/// reserved for command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let layout = config.layout();
    match cli.command {
        Command::Name { documents, id } => name(&config, &layout, &documents, id),
        Command::Inspect { documents } => inspect(&layout, &documents),
        Command::Regenerate { documents, id, force } => regenerate(&config, &layout, &documents, id, force),
        Command::Thumbnails => thumbnails(&config, &layout),
    }
}

fn name(config: &Config, layout: &Layout, documents: &Path, id: Option<u64>) -> Result<()> {
    let store = JsonStore::open(documents)?;
    let generator = config.filename_generator();
    let resolver = UniqueNameResolver::new(&generator);
    for doc in store.select(id)? {
        let original = resolver.resolve(&doc, &layout.originals, Role::Original);
        let archive = resolver.resolve(&doc, &layout.archive, Role::Archive);
        println!("{}\t{original}\t{archive}", doc.id);
    }
    Ok(())
}

fn inspect(layout: &Layout, documents: &Path) -> Result<()> {
    let store = JsonStore::open(documents)?;
    for doc in store.select(None)? {
        match ArchiveStatus::inspect(layout, &doc) {
            Ok(status) => println!("{}\t{status}", doc.id),
            Err(err) => {
                tracing::error!(document_id = doc.id, error = ?err, "Could not inspect archive");
                println!("{}\tunknown", doc.id);
            },
        }
    }
    Ok(())
}

/// Each document is handled on its own; one failing doesn't stop the rest.
fn regenerate(config: &Config, layout: &Layout, documents: &Path, id: Option<u64>, force: bool) -> Result<()> {
    let store = JsonStore::open(documents)?;
    let selected = store.select(id)?;
    let parser = &config.archive.parser;
    let parsers = CommandParserFactory::discover(&parser.program, parser.args.clone(), parser.timeout())
        .or_raise(|| ErrorKind::Parser)?;
    let generator = config.filename_generator();
    let regenerator =
        ArchiveRegenerator::new(layout, &generator, &parsers, &store).with_policy(config.archive.retry_policy());

    let mut failed = 0;
    for mut doc in selected {
        let result = match force {
            true => regenerator.regenerate(&mut doc).map(Some),
            false => regenerator.regenerate_if_needed(&mut doc),
        };
        match result {
            Ok(Some(outcome)) => println!("{}\t{outcome}", doc.id),
            Ok(None) => println!("{}\tup to date", doc.id),
            Err(err) => {
                failed += 1;
                tracing::error!(document_id = doc.id, error = ?err, "Archive regeneration failed");
                println!("{}\tfailed", doc.id);
            },
        }
    }
    if failed > 0 {
        tracing::warn!(failed, "Some archives could not be regenerated");
    }
    Ok(())
}

fn thumbnails(config: &Config, layout: &Layout) -> Result<()> {
    if !layout.thumbnails.is_dir() {
        tracing::info!(path = %layout.thumbnails.display(), "Thumbnail directory does not exist, nothing to convert");
        return Ok(());
    }
    let settings = &config.thumbnails;
    let converter = match &settings.binary {
        Some(binary) => Magick::with_binary(binary, settings.timeout()),
        None => Magick::discover(settings.timeout()),
    }
    .or_raise(|| ErrorKind::Thumbnails)?;
    let report =
        convert_all(&layout.thumbnails, &converter, &settings.pool_options()).or_raise(|| ErrorKind::Thumbnails)?;
    println!(
        "converted {}, failed {}, took {:.1}s",
        report.converted,
        report.failed,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}
