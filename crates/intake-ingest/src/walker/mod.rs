//! Recursive discovery over the supported drop-source shapes.

mod entry;
mod handle;

use std::collections::HashSet;
use std::sync::Arc;

pub use entry::{DiskEntry, Entry, EntryReader};
pub use handle::{DiskHandle, FsHandle, HandleKind};

use crate::pathed::{PathedFile, RawFile, tag};
use crate::policy::ExtensionPolicy;

/// Traversal caps. Hitting one stops descending and keeps what was found.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    pub max_depth: usize,
    pub max_entries: usize,
}

impl WalkLimits {
    #[must_use]
    pub fn from_config(config: &intake_core::config::IngestConfig) -> Self {
        Self {
            max_depth: config.max_walk_depth,
            max_entries: config.max_walk_entries,
        }
    }
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self::from_config(&intake_core::config::IngestConfig::default())
    }
}

/// One resolved drop source.
pub enum DropSource {
    Handles(Vec<Arc<dyn FsHandle>>),
    Entries(Vec<Arc<dyn Entry>>),
    Files(Vec<RawFile>),
}

impl std::fmt::Debug for DropSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handles(h) => f.debug_tuple("Handles").field(&h.len()).finish(),
            Self::Entries(e) => f.debug_tuple("Entries").field(&e.len()).finish(),
            Self::Files(files) => f.debug_tuple("Files").field(&files.len()).finish(),
        }
    }
}

impl DropSource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handles(_) => "handles",
            Self::Entries(_) => "entries",
            Self::Files(_) => "files",
        }
    }
}

/// A drop or selection event exposing any subset of the source capabilities.
#[derive(Default)]
pub struct DropEvent {
    handles: Option<Vec<Arc<dyn FsHandle>>>,
    entries: Option<Vec<Arc<dyn Entry>>>,
    files: Vec<RawFile>,
}

impl DropEvent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_handles(mut self, handles: Vec<Arc<dyn FsHandle>>) -> Self {
        self.handles = Some(handles);
        self
    }

    #[must_use]
    pub fn with_entries(mut self, entries: Vec<Arc<dyn Entry>>) -> Self {
        self.entries = Some(entries);
        self
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<RawFile>) -> Self {
        self.files = files;
        self
    }

    /// Pick the richest available shape: handles, then entries, then the flat list.
    #[must_use]
    pub fn probe(self) -> DropSource {
        match (self.handles, self.entries) {
            (Some(handles), _) if !handles.is_empty() => DropSource::Handles(handles),
            (_, Some(entries)) if !entries.is_empty() => DropSource::Entries(entries),
            _ => DropSource::Files(self.files),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceWalker {
    limits: WalkLimits,
    filter: Option<ExtensionPolicy>,
}

impl SourceWalker {
    #[must_use]
    pub fn new(limits: WalkLimits) -> Self {
        Self {
            limits,
            filter: None,
        }
    }

    /// Drop files whose extension the policy does not accept.
    #[must_use]
    pub fn with_filter(mut self, policy: ExtensionPolicy) -> Self {
        self.filter = Some(policy);
        self
    }

    pub async fn walk_event(&self, event: DropEvent) -> Vec<PathedFile> {
        self.walk(event.probe()).await
    }

    /// Flatten `source` into path-tagged files, first occurrence of each identity key wins.
    pub async fn walk(&self, source: DropSource) -> Vec<PathedFile> {
        let kind = source.kind();
        let found = match source {
            DropSource::Handles(roots) => handle::walk_handles(roots, self.limits).await,
            DropSource::Entries(roots) => entry::walk_entries(roots, self.limits).await,
            DropSource::Files(files) => files
                .into_iter()
                .map(|file| {
                    let path = file.native_path().unwrap_or(file.name()).to_owned();
                    tag(file, path)
                })
                .collect(),
        };

        let total = found.len();
        let mut seen = HashSet::with_capacity(total);
        let files: Vec<_> = found
            .into_iter()
            .filter(|f| {
                self.filter
                    .as_ref()
                    .is_none_or(|policy| policy.is_allowed(f.name()))
            })
            .filter(|f| seen.insert(f.identity_key()))
            .collect();

        tracing::debug!(source = kind, found = total, kept = files.len(), "walk complete");
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(files: &[PathedFile]) -> Vec<&str> {
        files.iter().map(PathedFile::relative_path).collect()
    }

    #[tokio::test]
    async fn reports_folder_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("reports");
        std::fs::create_dir_all(root.join("2024")).unwrap();
        std::fs::write(root.join("a.pdf"), b"a").unwrap();
        std::fs::write(root.join("b.exe"), b"b").unwrap();
        std::fs::write(root.join("2024/c.pdf"), b"c").unwrap();

        let handle = DiskHandle::open(&root).await.unwrap();
        let event = DropEvent::new().with_handles(vec![Arc::new(handle)]);
        let files = SourceWalker::default()
            .with_filter(ExtensionPolicy::default())
            .walk_event(event)
            .await;

        let mut got = paths(&files);
        got.sort_unstable();
        assert_eq!(got, ["reports/2024/c.pdf", "reports/a.pdf"]);
    }

    #[tokio::test]
    async fn flat_list_uses_native_path_then_name() {
        let files = vec![
            RawFile::from_bytes("a.pdf", b"a".to_vec(), 1).with_native_path("docs/a.pdf"),
            RawFile::from_bytes("b.pdf", b"b".to_vec(), 1),
        ];
        let walked = SourceWalker::default()
            .walk(DropSource::Files(files))
            .await;
        assert_eq!(paths(&walked), ["docs/a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn duplicate_identity_first_wins() {
        let files = vec![
            RawFile::from_bytes("a.pdf", b"first".to_vec(), 7),
            RawFile::from_bytes("a.pdf", b"other".to_vec(), 7),
            RawFile::from_bytes("a.pdf", b"longer".to_vec(), 7),
        ];
        let walked = SourceWalker::default()
            .walk(DropSource::Files(files))
            .await;
        assert_eq!(walked.len(), 2);
        assert_eq!(walked[0].file().read().await.unwrap(), b"first");
    }

    #[test]
    fn probe_prefers_handles_then_entries() {
        let file = || vec![RawFile::from_bytes("a.pdf", b"a".to_vec(), 0)];
        assert_eq!(DropEvent::new().with_files(file()).probe().kind(), "files");
        assert_eq!(
            DropEvent::new()
                .with_handles(Vec::new())
                .with_files(file())
                .probe()
                .kind(),
            "files"
        );
    }

    #[tokio::test]
    async fn probe_picks_available_tree_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"a").unwrap();

        let handle: Arc<dyn FsHandle> = Arc::new(DiskHandle::open(&path).await.unwrap());
        let entry: Arc<dyn Entry> = Arc::new(DiskEntry::root(&path, 10).await.unwrap());

        let both = DropEvent::new()
            .with_entries(vec![Arc::clone(&entry)])
            .with_handles(vec![handle]);
        assert_eq!(both.probe().kind(), "handles");

        let entries_only = DropEvent::new().with_entries(vec![entry]);
        assert_eq!(entries_only.probe().kind(), "entries");
    }

    #[test]
    fn limits_follow_config() {
        let mut config = intake_core::config::IngestConfig::default();
        config.max_walk_depth = 3;
        config.max_walk_entries = 9;
        let limits = WalkLimits::from_config(&config);
        assert_eq!((limits.max_depth, limits.max_entries), (3, 9));
    }
}
