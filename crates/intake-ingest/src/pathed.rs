//! Raw file handles and their path-tagged form.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::container::{self, ArchiveSource};

/// Where the bytes of a [`RawFile`] live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Disk(PathBuf),
    Memory(Arc<[u8]>),
    /// Entry `index` of a zip archive, decompressed on read.
    Archive {
        archive: Arc<ArchiveSource>,
        index: usize,
    },
}

/// A discovered file: metadata plus a way to read its content.
#[derive(Debug, Clone)]
pub struct RawFile {
    name: String,
    size: u64,
    last_modified: i64,
    native_path: Option<String>,
    source: FileSource,
}

impl RawFile {
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, last_modified: i64, source: FileSource) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified,
            native_path: None,
            source,
        }
    }

    #[must_use]
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        last_modified: i64,
    ) -> Self {
        let bytes = bytes.into();
        Self::new(
            name,
            bytes.len() as u64,
            last_modified,
            FileSource::Memory(bytes),
        )
    }

    /// Stat a file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_millis()).ok())
            .unwrap_or(0);
        Ok(Self::new(
            name,
            meta.len(),
            last_modified,
            FileSource::Disk(path.to_path_buf()),
        ))
    }

    /// Attach the relative path a folder picker reported for this file.
    #[must_use]
    pub fn with_native_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.native_path = (!path.is_empty()).then_some(path);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Milliseconds since the Unix epoch, 0 when unknown.
    #[must_use]
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    #[must_use]
    pub fn native_path(&self) -> Option<&str> {
        self.native_path.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Read the whole content into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or archive entry cannot be read.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Disk(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
            FileSource::Archive { archive, index } => {
                let archive = Arc::clone(archive);
                let index = *index;
                tokio::task::spawn_blocking(move || container::read_entry(&archive, index))
                    .await
                    .map_err(std::io::Error::other)?
            }
        }
    }
}

/// A [`RawFile`] tagged with its position in the dropped hierarchy.
///
/// The relative path includes the file name (`reports/2024/c.pdf`); an empty
/// path means a top-level file with no folder.
#[derive(Debug, Clone)]
pub struct PathedFile {
    file: RawFile,
    relative_path: String,
}

/// Attach `relative_path` to `file` without touching its content.
#[must_use]
pub fn tag(file: RawFile, relative_path: impl Into<String>) -> PathedFile {
    PathedFile {
        file,
        relative_path: relative_path.into(),
    }
}

impl PathedFile {
    #[must_use]
    pub fn file(&self) -> &RawFile {
        &self.file
    }

    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.file.name()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    /// Path shown to the user: the picker-reported path when there is one.
    #[must_use]
    pub fn display_path(&self) -> &str {
        match self.file.native_path() {
            Some(native) => native,
            None if self.relative_path.is_empty() => self.file.name(),
            None => &self.relative_path,
        }
    }

    /// `relativePath::name:size:lastModified`.
    #[must_use]
    pub fn identity_key(&self) -> String {
        format!(
            "{}::{}:{}:{}",
            self.relative_path,
            self.file.name(),
            self.file.size(),
            self.file.last_modified()
        )
    }

    /// Lower-cased extension without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        extension_of(self.file.name())
    }

    /// File name without its last extension. Dot-files keep their full name.
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self.file.name();
        match name.rfind('.') {
            Some(i) if i > 0 => &name[..i],
            _ => name,
        }
    }

    /// First folder segment of the relative path, if the file sits in a folder.
    #[must_use]
    pub fn top_folder(&self) -> Option<&str> {
        let mut segments = self.relative_path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        segments.next().map(|_| first)
    }
}

/// Folder part of a `/`-separated path including the trailing `/`, or `""`.
pub(crate) fn parent_prefix(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_lowercase())
}
