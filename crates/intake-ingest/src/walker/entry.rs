use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use super::WalkLimits;
use crate::error::WalkError;
use crate::pathed::{PathedFile, RawFile, tag};

/// Entry of a legacy directory tree, addressed by an absolute `/`-rooted path.
pub trait Entry: Send + Sync {
    fn name(&self) -> &str;

    /// Full path from the drop root, e.g. `/reports/a.pdf`.
    fn full_path(&self) -> &str;

    fn is_directory(&self) -> bool;

    fn file(&self) -> Pin<Box<dyn Future<Output = Result<RawFile, WalkError>> + Send + '_>>;

    /// # Errors
    ///
    /// Returns an error if the entry is not a directory.
    fn reader(&self) -> Result<Box<dyn EntryReader>, WalkError>;
}

/// Batched directory enumeration. An empty batch means the listing is complete.
pub trait EntryReader: Send {
    #[allow(clippy::type_complexity)]
    fn read_entries(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Arc<dyn Entry>>, WalkError>> + Send + '_>>;
}

/// [`Entry`] over the local filesystem, listing directories in fixed-size batches.
#[derive(Debug, Clone)]
pub struct DiskEntry {
    path: PathBuf,
    name: String,
    full_path: String,
    is_directory: bool,
    batch_size: usize,
}

impl DiskEntry {
    /// Open `path` as a drop root; its full path is `/<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be inspected.
    pub async fn root(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, WalkError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        Ok(Self {
            path: path.to_path_buf(),
            full_path: format!("/{name}"),
            name,
            is_directory: meta.is_dir(),
            batch_size: batch_size.max(1),
        })
    }
}

impl Entry for DiskEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }

    fn file(&self) -> Pin<Box<dyn Future<Output = Result<RawFile, WalkError>> + Send + '_>> {
        Box::pin(async move {
            if self.is_directory {
                return Err(WalkError::NotAFile(self.full_path.clone()));
            }
            Ok(RawFile::from_path(&self.path).await?)
        })
    }

    fn reader(&self) -> Result<Box<dyn EntryReader>, WalkError> {
        if !self.is_directory {
            return Err(WalkError::NotADirectory(self.full_path.clone()));
        }
        Ok(Box::new(DiskEntryReader {
            dir: self.path.clone(),
            parent: self.full_path.clone(),
            batch_size: self.batch_size,
            listing: None,
            exhausted: false,
        }))
    }
}

struct DiskEntryReader {
    dir: PathBuf,
    parent: String,
    batch_size: usize,
    listing: Option<tokio::fs::ReadDir>,
    exhausted: bool,
}

impl EntryReader for DiskEntryReader {
    fn read_entries(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Arc<dyn Entry>>, WalkError>> + Send + '_>>
    {
        Box::pin(async move {
            if self.exhausted {
                return Ok(Vec::new());
            }
            if self.listing.is_none() {
                self.listing = Some(tokio::fs::read_dir(&self.dir).await?);
            }
            let Some(listing) = self.listing.as_mut() else {
                return Ok(Vec::new());
            };

            let mut batch: Vec<Arc<dyn Entry>> = Vec::with_capacity(self.batch_size);
            while batch.len() < self.batch_size {
                let Some(entry) = listing.next_entry().await? else {
                    self.exhausted = true;
                    break;
                };
                let file_type = entry.file_type().await?;
                if !file_type.is_dir() && !file_type.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                batch.push(Arc::new(DiskEntry {
                    path: entry.path(),
                    full_path: format!("{}/{name}", self.parent),
                    name,
                    is_directory: file_type.is_dir(),
                    batch_size: self.batch_size,
                }));
            }
            Ok(batch)
        })
    }
}

/// Walk legacy entry trees root by root, draining each reader batch by batch.
pub(crate) async fn walk_entries(roots: Vec<Arc<dyn Entry>>, limits: WalkLimits) -> Vec<PathedFile> {
    let mut out = Vec::new();
    let mut seen = 0usize;
    let mut stack: Vec<(Arc<dyn Entry>, usize)> =
        roots.into_iter().rev().map(|root| (root, 0)).collect();

    while let Some((entry, depth)) = stack.pop() {
        seen += 1;
        if seen > limits.max_entries {
            tracing::warn!(
                limit = limits.max_entries,
                "entry limit reached, stopping traversal"
            );
            break;
        }
        let path = entry.full_path().trim_start_matches('/').to_owned();

        if !entry.is_directory() {
            match entry.file().await {
                Ok(raw) => out.push(tag(raw, path)),
                Err(e) => tracing::warn!(path = %path, error = %e, "skipping unreadable file"),
            }
            continue;
        }
        if depth >= limits.max_depth {
            tracing::warn!(path = %path, limit = limits.max_depth, "depth limit reached");
            continue;
        }

        let mut reader = match entry.reader() {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping unreadable directory");
                continue;
            }
        };
        let mut children = Vec::new();
        loop {
            match reader.read_entries().await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => children.extend(batch),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "directory listing interrupted");
                    break;
                }
            }
        }
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    out
}
