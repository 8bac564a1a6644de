use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use intake_catalog::{CatalogClient, DownloadKind, SearchQuery, facets, summaries};
use intake_core::config::Config;
use intake_ingest::walker::{DiskEntry, DiskHandle, Entry, FsHandle};
use intake_ingest::{
    DropEvent, ExtensionPolicy, ItemStatus, RawFile, SourceWalker, StatusKind, WalkLimits,
    pretty_bytes,
};
use intake_upload::{BatchReport, DocumentProcessor, HttpProcessor, UploadScheduler};

use crate::cli::WalkerKind;

pub struct UploadArgs {
    pub paths: Vec<PathBuf>,
    pub walker: WalkerKind,
    pub concurrency: Option<usize>,
    pub dry_run: bool,
}

/// Resolve CLI paths into a drop event of the requested shape.
///
/// Paths that cannot be opened are logged and skipped.
pub async fn drop_event(paths: &[PathBuf], kind: WalkerKind, config: &Config) -> DropEvent {
    match kind {
        WalkerKind::Handles => {
            let mut handles: Vec<Arc<dyn FsHandle>> = Vec::with_capacity(paths.len());
            for path in paths {
                match DiskHandle::open(path).await {
                    Ok(handle) => handles.push(Arc::new(handle)),
                    Err(e) => tracing::warn!(path = %path.display(), "skipping: {e}"),
                }
            }
            DropEvent::new().with_handles(handles)
        }
        WalkerKind::Entries => {
            let mut entries: Vec<Arc<dyn Entry>> = Vec::with_capacity(paths.len());
            for path in paths {
                match DiskEntry::root(path, config.ingest.entry_batch_size).await {
                    Ok(entry) => entries.push(Arc::new(entry)),
                    Err(e) => tracing::warn!(path = %path.display(), "skipping: {e}"),
                }
            }
            DropEvent::new().with_entries(entries)
        }
        WalkerKind::Flat => {
            let mut files = Vec::with_capacity(paths.len());
            for path in paths {
                if path.is_dir() {
                    tracing::warn!(path = %path.display(), "flat walker skips folders");
                    continue;
                }
                match RawFile::from_path(path).await {
                    Ok(file) => files.push(file),
                    Err(e) => tracing::warn!(path = %path.display(), "skipping: {e}"),
                }
            }
            DropEvent::new().with_files(files)
        }
    }
}

pub async fn upload(config: &Config, args: UploadArgs) -> anyhow::Result<()> {
    let event = drop_event(&args.paths, args.walker, config).await;
    let walker = SourceWalker::new(WalkLimits::from_config(&config.ingest))
        .with_filter(ExtensionPolicy::from_config(&config.ingest));
    let files = walker.walk_event(event).await;

    let processor: Arc<dyn DocumentProcessor> = Arc::new(
        HttpProcessor::from_config(&config.processor).context("failed to build HTTP client")?,
    );
    let mut scheduler = UploadScheduler::from_config(config, processor);
    if let Some(concurrency) = args.concurrency {
        scheduler = scheduler.with_concurrency(concurrency);
    }

    let report = scheduler.enqueue(files).await;
    println!(
        "queued {} file(s): {} too large, {} duplicate, {} unsupported, {} archive(s) expanded, {} unreadable",
        report.accepted,
        report.rejected_oversize,
        report.skipped_duplicate,
        report.skipped_unsupported,
        report.archives_expanded,
        report.archives_failed,
    );
    print_queue(&scheduler);

    if args.dry_run {
        return Ok(());
    }

    match run_until_interrupted(&scheduler).await {
        Some(batch) => println!(
            "uploaded {} of {}, {} failed, {} skipped",
            batch.done, batch.scheduled, batch.failed, batch.skipped
        ),
        None => println!("interrupted, unfinished uploads returned to idle"),
    }
    print_queue(&scheduler);

    let items = scheduler.snapshot();
    let labels = facets(&items);
    if !labels.is_empty() {
        println!("tags: {}", labels.join(", "));
    }
    for row in summaries(&items) {
        println!(
            "{}  {}  [{}]  {}",
            row.server_file_id.as_deref().unwrap_or("-"),
            row.relative_path,
            row.tags.join(", "),
            row.summary.lines().next().unwrap_or_default(),
        );
    }
    Ok(())
}

/// Run the batch. On ctrl-c, stop dispatching and return in-flight items to idle.
async fn run_until_interrupted(scheduler: &UploadScheduler) -> Option<BatchReport> {
    let run = scheduler.start_all();
    tokio::pin!(run);
    let signal = tokio::select! {
        report = &mut run => return Some(report),
        signal = tokio::signal::ctrl_c() => signal,
    };
    if let Err(e) = signal {
        tracing::error!("failed to listen for ctrl-c: {e:#}");
        return Some(run.await);
    }
    tracing::info!("received shutdown signal, cancelling uploads");
    for item in scheduler.snapshot() {
        if item.kind() == StatusKind::Uploading {
            scheduler.cancel_one(item.id);
        }
    }
    None
}

fn print_queue(scheduler: &UploadScheduler) {
    let stats = scheduler.stats();
    println!(
        "{} item(s), {} total | idle {} uploading {} done {} error {}",
        stats.items,
        pretty_bytes(stats.total_bytes),
        stats.count(StatusKind::Idle),
        stats.count(StatusKind::Uploading),
        stats.count(StatusKind::Done),
        stats.count(StatusKind::Error),
    );
    for item in scheduler.snapshot() {
        let detail = match &item.status {
            ItemStatus::Error(err) => format!(" ({err})"),
            _ => String::new(),
        };
        println!(
            "  {:<9} {:>9}  {}  [{}]{detail}",
            item.kind(),
            pretty_bytes(item.file.size()),
            item.file.display_path(),
            item.category_name,
        );
    }
}

pub async fn search(
    config: &Config,
    query: Option<String>,
    tags: Vec<String>,
    page: u32,
) -> anyhow::Result<()> {
    let client = CatalogClient::from_config(&config.catalog)?;
    let result = client
        .search(&SearchQuery {
            q: query.unwrap_or_default(),
            categories: tags,
            page,
            page_size: config.catalog.page_size,
        })
        .await?;

    println!(
        "{} document(s), page {} of {}",
        result.total,
        result.page,
        result.page_count()
    );
    for doc in &result.items {
        println!(
            "{}  {}  {}  [{}]",
            doc.server_file_id.as_deref().unwrap_or(&doc.id),
            if doc.title.is_empty() { &doc.filename } else { &doc.title },
            pretty_bytes(doc.size),
            doc.tags.join(", "),
        );
    }
    if !result.categories.is_empty() {
        println!("categories: {}", result.categories.join(", "));
    }
    Ok(())
}

pub async fn fetch(config: &Config, id: &str, kind: DownloadKind) -> anyhow::Result<()> {
    let client = CatalogClient::from_config(&config.catalog)?;
    match kind {
        DownloadKind::Text => println!("{}", client.fetch_text(id).await?),
        DownloadKind::Json => {
            let value = client.fetch_json(id).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
