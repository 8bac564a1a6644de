use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;

use super::WalkLimits;
use crate::error::WalkError;
use crate::pathed::{PathedFile, RawFile, tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    File,
    Directory,
}

/// A node of a native filesystem handle tree.
pub trait FsHandle: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> HandleKind;

    /// Resolve a file handle to its content source.
    fn file(&self) -> Pin<Box<dyn Future<Output = Result<RawFile, WalkError>> + Send + '_>>;

    /// List the direct children of a directory handle.
    #[allow(clippy::type_complexity)]
    fn children(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Arc<dyn FsHandle>>, WalkError>> + Send + '_>>;
}

/// [`FsHandle`] over the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskHandle {
    path: PathBuf,
    name: String,
    kind: HandleKind,
}

impl DiskHandle {
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or is neither a file nor a directory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, WalkError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        let kind = if meta.is_dir() {
            HandleKind::Directory
        } else if meta.is_file() {
            HandleKind::File
        } else {
            return Err(WalkError::NotAFile(path.display().to_string()));
        };
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        Ok(Self {
            path: path.to_path_buf(),
            name,
            kind,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FsHandle for DiskHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> HandleKind {
        self.kind
    }

    fn file(&self) -> Pin<Box<dyn Future<Output = Result<RawFile, WalkError>> + Send + '_>> {
        Box::pin(async move {
            if self.kind != HandleKind::File {
                return Err(WalkError::NotAFile(self.path.display().to_string()));
            }
            Ok(RawFile::from_path(&self.path).await?)
        })
    }

    fn children(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Arc<dyn FsHandle>>, WalkError>> + Send + '_>>
    {
        Box::pin(async move {
            if self.kind != HandleKind::Directory {
                return Err(WalkError::NotADirectory(self.path.display().to_string()));
            }
            let mut dir = tokio::fs::read_dir(&self.path).await?;
            let mut children = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                let kind = if file_type.is_dir() {
                    HandleKind::Directory
                } else if file_type.is_file() {
                    HandleKind::File
                } else {
                    continue;
                };
                children.push(Self {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                    kind,
                });
            }
            children.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(children
                .into_iter()
                .map(|c| Arc::new(c) as Arc<dyn FsHandle>)
                .collect())
        })
    }
}

/// Walk each root in its own task and flatten the results in root order.
pub(crate) async fn walk_handles(
    roots: Vec<Arc<dyn FsHandle>>,
    limits: WalkLimits,
) -> Vec<PathedFile> {
    let budget = Arc::new(AtomicUsize::new(0));
    let mut slots: Vec<Vec<PathedFile>> = vec![Vec::new(); roots.len()];
    let mut join_set = JoinSet::new();

    for (slot, root) in roots.into_iter().enumerate() {
        let budget = Arc::clone(&budget);
        join_set.spawn(async move { (slot, walk_root(root, limits, budget).await) });
    }

    while let Some(result) = join_set.join_next().await {
        match result {
            Ok((slot, files)) => slots[slot] = files,
            Err(e) => tracing::warn!("handle walk task panicked: {e}"),
        }
    }

    slots.into_iter().flatten().collect()
}

async fn walk_root(
    root: Arc<dyn FsHandle>,
    limits: WalkLimits,
    budget: Arc<AtomicUsize>,
) -> Vec<PathedFile> {
    let mut out = Vec::new();
    let mut stack = vec![(root, String::new(), 0usize)];

    while let Some((handle, prefix, depth)) = stack.pop() {
        if budget.fetch_add(1, Ordering::Relaxed) >= limits.max_entries {
            tracing::warn!(
                limit = limits.max_entries,
                "entry limit reached, stopping traversal"
            );
            break;
        }
        let path = format!("{prefix}{}", handle.name());

        match handle.kind() {
            HandleKind::File => match handle.file().await {
                Ok(raw) => out.push(tag(raw, path)),
                Err(e) => tracing::warn!(path = %path, error = %e, "skipping unreadable file"),
            },
            HandleKind::Directory => {
                if depth >= limits.max_depth {
                    tracing::warn!(path = %path, limit = limits.max_depth, "depth limit reached");
                    continue;
                }
                match handle.children().await {
                    Ok(children) => {
                        let child_prefix = format!("{path}/");
                        for child in children.into_iter().rev() {
                            stack.push((child, child_prefix.clone(), depth + 1));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "skipping unreadable directory");
                    }
                }
            }
        }
    }
    out
}
