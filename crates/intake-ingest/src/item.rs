//! Queue item model shared by the gate and the upload scheduler.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pathed::PathedFile;

pub type ItemId = Uuid;

/// Per-attempt cancellation signal handed to the processor call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
        }
    }

    /// Only transport failures may be retried; validation failures are permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the processor returned for a completed item.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub raw: serde_json::Value,
    pub summary: String,
    pub tags: Vec<String>,
    pub server_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ItemStatus {
    Idle,
    Uploading { cancel: CancelHandle, attempt: u64 },
    Done(UploadResult),
    Error(ItemError),
}

impl ItemStatus {
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Idle => StatusKind::Idle,
            Self::Uploading { .. } => StatusKind::Uploading,
            Self::Done(_) => StatusKind::Done,
            Self::Error(_) => StatusKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKind {
    Idle,
    Uploading,
    Done,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: ItemId,
    pub file: Arc<PathedFile>,
    pub status: ItemStatus,
    pub progress: u8,
    pub category_name: String,
    pub title: String,
}

impl QueueItem {
    #[must_use]
    pub fn new(file: PathedFile, category_name: String, title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file: Arc::new(file),
            status: ItemStatus::Idle,
            progress: 0,
            category_name,
            title,
        }
    }

    #[must_use]
    pub fn rejected(file: PathedFile, category_name: String, title: String, error: ItemError) -> Self {
        Self {
            status: ItemStatus::Error(error),
            ..Self::new(file, category_name, title)
        }
    }

    #[must_use]
    pub fn identity_key(&self) -> String {
        self.file.identity_key()
    }

    #[must_use]
    pub fn kind(&self) -> StatusKind {
        self.status.kind()
    }

    #[must_use]
    pub fn result(&self) -> Option<&UploadResult> {
        match &self.status {
            ItemStatus::Done(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ItemError> {
        match &self.status {
            ItemStatus::Error(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn cancel_handle(&self) -> Option<&CancelHandle> {
        match &self.status {
            ItemStatus::Uploading { cancel, .. } => Some(cancel),
            _ => None,
        }
    }
}
