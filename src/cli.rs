use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use intake_catalog::DownloadKind;

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(version, about = "Queue dropped documents for OCR and summarization")]
pub struct Cli {
    /// Config file (falls back to INTAKE_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        if let Ok(path) = std::env::var("INTAKE_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk files, folders, and zip archives and upload every supported document
    Upload {
        /// Files or folders to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// How folders are traversed
        #[arg(long, value_enum, default_value_t = WalkerKind::Handles)]
        walker: WalkerKind,

        /// Override upload.concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Build and print the queue without uploading
        #[arg(long)]
        dry_run: bool,
    },
    /// Query the document store
    Search {
        query: Option<String>,

        /// Require a category (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Download a stored result by server file id
    Fetch {
        id: String,

        #[arg(long, value_enum, default_value_t = FetchKind::Text)]
        kind: FetchKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WalkerKind {
    /// Native directory handles, one task per top-level path
    Handles,
    /// Batched directory entry readers
    Entries,
    /// Plain file list, folders are skipped
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchKind {
    Text,
    Json,
}

impl From<FetchKind> for DownloadKind {
    fn from(kind: FetchKind) -> Self {
        match kind {
            FetchKind::Text => Self::Text,
            FetchKind::Json => Self::Json,
        }
    }
}
