mod cli;
mod commands;

use std::path::Path;

use clap::Parser;
use intake_core::config::Config;

use crate::cli::{Cli, Command};
use crate::commands::UploadArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let config = Config::load(&config_path)?;
    init_subscriber(&config.log.level, cli.log_file.as_deref());
    tracing::debug!(path = %config_path.display(), "config loaded");
    config.validate()?;

    match cli.command {
        Command::Upload {
            paths,
            walker,
            concurrency,
            dry_run,
        } => {
            commands::upload(
                &config,
                UploadArgs {
                    paths,
                    walker,
                    concurrency,
                    dry_run,
                },
            )
            .await
        }
        Command::Search { query, tags, page } => commands::search(&config, query, tags, page).await,
        Command::Fetch { id, kind } => commands::fetch(&config, &id, kind.into()).await,
    }
}

fn init_subscriber(level: &str, log_file: Option<&Path>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file = log_file.and_then(|path| match std::fs::File::create(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("cannot open log file {}: {e}", path.display());
            None
        }
    });
    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
