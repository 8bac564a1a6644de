//! Ingestion half of the intake pipeline.
//!
//! Drop sources (handle trees, batched entry readers, flat file lists) are walked
//! into [`PathedFile`]s, zip containers are expanded in-process, and the
//! [`IngestGate`] validates and deduplicates the result into [`QueueItem`]s.

pub mod container;
pub mod error;
pub mod gate;
pub mod item;
pub mod pathed;
pub mod policy;
pub mod walker;

pub use container::{ArchiveSource, ContainerExpander};
pub use error::{ContainerError, WalkError};
pub use gate::{GateConfig, IngestGate, IngestOutcome, IngestReport, pretty_bytes};
pub use item::{
    CancelHandle, ErrorKind, ItemError, ItemId, ItemStatus, QueueItem, StatusKind, UploadResult,
};
pub use pathed::{FileSource, PathedFile, RawFile, tag};
pub use policy::{ExtensionPolicy, FileClass};
pub use walker::{DropEvent, DropSource, SourceWalker, WalkLimits};
