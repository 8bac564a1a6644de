//! In-process zip expansion.
//!
//! Listing reads only the central directory; entry content is decompressed when
//! the produced [`RawFile`] is read.

use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use zip::ZipArchive;

use crate::error::ContainerError;
use crate::pathed::{FileSource, PathedFile, RawFile, extension_of, parent_prefix, tag};
use crate::policy::CONTAINER_EXTENSION;

const RESOURCE_FORK_DIR: &str = "__MACOSX";
const DEFAULT_MAX_NESTED_BYTES: u64 = 80 * 1024 * 1024;

/// Backing storage of an archive being expanded.
#[derive(Debug)]
pub enum ArchiveSource {
    Disk(PathBuf),
    Memory(Arc<[u8]>),
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

impl ArchiveSource {
    fn open(&self) -> Result<ZipArchive<Box<dyn ReadSeek>>, ContainerError> {
        let reader: Box<dyn ReadSeek> = match self {
            Self::Disk(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
            Self::Memory(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
        };
        Ok(ZipArchive::new(reader)?)
    }
}

/// Decompress entry `index` of `archive`. Blocking.
pub(crate) fn read_entry(archive: &ArchiveSource, index: usize) -> std::io::Result<Vec<u8>> {
    let mut zip = archive.open().map_err(|e| match e {
        ContainerError::Io(io) => io,
        other => std::io::Error::other(other),
    })?;
    let mut entry = zip.by_index(index).map_err(std::io::Error::from)?;
    let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerExpander {
    max_depth: usize,
    max_nested_bytes: u64,
}

impl ContainerExpander {
    /// `max_depth` counts the archive itself; nested archives below it are skipped.
    /// Nested archives larger than `max_nested_bytes` (uncompressed) are skipped
    /// instead of being loaded into memory.
    #[must_use]
    pub fn new(max_depth: usize, max_nested_bytes: u64) -> Self {
        Self {
            max_depth: max_depth.max(1),
            max_nested_bytes,
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// List the files inside an archive, each tagged with its internal path.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or parsed. Nested
    /// archives that fail are logged and skipped.
    pub async fn expand(&self, file: &PathedFile) -> Result<Vec<PathedFile>, ContainerError> {
        let source = match file.file().source() {
            FileSource::Disk(path) => ArchiveSource::Disk(path.clone()),
            FileSource::Memory(bytes) => ArchiveSource::Memory(Arc::clone(bytes)),
            FileSource::Archive { .. } => ArchiveSource::Memory(file.file().read().await?.into()),
        };
        let limits = *self;
        let files = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            list_entries(Arc::new(source), "", 1, limits, &mut out)?;
            Ok::<_, ContainerError>(out)
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::debug!(
            archive = %file.display_path(),
            entries = files.len(),
            "expanded archive"
        );
        Ok(files)
    }
}

impl Default for ContainerExpander {
    fn default() -> Self {
        Self::new(2, DEFAULT_MAX_NESTED_BYTES)
    }
}

fn list_entries(
    source: Arc<ArchiveSource>,
    prefix: &str,
    depth: usize,
    limits: ContainerExpander,
    out: &mut Vec<PathedFile>,
) -> Result<(), ContainerError> {
    let mut zip = source.open()?;

    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(internal) = entry.enclosed_name().as_deref().and_then(slash_path) else {
            tracing::warn!(entry = entry.name(), "skipping unsafe archive entry name");
            continue;
        };
        if internal.split('/').next() == Some(RESOURCE_FORK_DIR) {
            continue;
        }

        let name = internal
            .rsplit('/')
            .next()
            .unwrap_or(internal.as_str())
            .to_owned();
        let last_modified = entry.last_modified().map_or(0, dos_millis);
        let size = entry.size();
        drop(entry);

        let relative = format!("{prefix}{internal}");
        if extension_of(&name).as_deref() == Some(CONTAINER_EXTENSION) {
            if depth >= limits.max_depth {
                tracing::warn!(
                    entry = %relative,
                    error = %ContainerError::TooDeep(limits.max_depth),
                    "skipping nested archive"
                );
                continue;
            }
            if size > limits.max_nested_bytes {
                tracing::warn!(
                    entry = %relative,
                    error = %ContainerError::TooLarge {
                        size,
                        limit: limits.max_nested_bytes,
                    },
                    "skipping nested archive"
                );
                continue;
            }
            let nested = match read_entry(&source, index) {
                Ok(bytes) => Arc::new(ArchiveSource::Memory(bytes.into())),
                Err(e) => {
                    tracing::warn!(entry = %relative, error = %e, "failed to read nested archive");
                    continue;
                }
            };
            if let Err(e) = list_entries(nested, parent_prefix(&relative), depth + 1, limits, out) {
                tracing::warn!(entry = %relative, error = %e, "failed to expand nested archive");
            }
            continue;
        }

        let raw = RawFile::new(
            name,
            size,
            last_modified,
            FileSource::Archive {
                archive: Arc::clone(&source),
                index,
            },
        );
        out.push(tag(raw, relative));
    }
    Ok(())
}

fn slash_path(path: &Path) -> Option<String> {
    let segments: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}

fn dos_millis(dt: zip::DateTime) -> i64 {
    NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )
    .and_then(|d| {
        d.and_hms_opt(
            u32::from(dt.hour()),
            u32::from(dt.minute()),
            u32::from(dt.second()),
        )
    })
    .map_or(0, |t| t.and_utc().timestamp_millis())
}

/// Build an in-memory zip from `(name, content)` pairs. Names ending in `/`
/// become directory entries.
#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(
            zip::DateTime::from_date_and_time(2024, 3, 15, 10, 30, 0).expect("valid date"),
        );
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add dir");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(content).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}
