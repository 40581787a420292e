use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "archivist", version, about = "Keep stored documents' files named, archived and thumbnailed")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the filenames documents would be stored under.
    Name {
        /// JSON array of documents.
        documents: PathBuf,
        /// Only this document.
        #[arg(long)]
        id: Option<u64>,
    },
    /// Report the state of each document's archive rendition.
    Inspect {
        /// JSON array of documents.
        documents: PathBuf,
    },
    /// Rebuild archive renditions that are missing or out of date.
    Regenerate {
        /// JSON array of documents; updated in place.
        documents: PathBuf,
        /// Only this document.
        #[arg(long)]
        id: Option<u64>,
        /// Regenerate even when the current archive looks fine.
        #[arg(long)]
        force: bool,
    },
    /// Convert legacy thumbnails to the configured format.
    Thumbnails,
}
