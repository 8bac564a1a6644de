//! Upload queue and concurrency-limited dispatch.
//!
//! The queue lives behind a mutex that is never held across an await. Every
//! attempt carries a number; a completion whose attempt no longer matches the
//! item (cancelled, removed, retried) is dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use intake_core::config::Config;
use intake_ingest::{
    CancelHandle, GateConfig, IngestGate, IngestReport, ItemError, ItemId, ItemStatus, PathedFile,
    QueueItem, StatusKind, UploadResult,
};
use serde_json::Value;

use crate::error::ProcessError;
use crate::processor::{
    DocumentProcessor, ProcessOptions, ProcessRequest, ProgressFn, server_file_id, summary_text,
};
use crate::tags::derive_tags;

/// Outcome counts for one [`UploadScheduler::start_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub scheduled: usize,
    pub done: usize,
    pub failed: usize,
    /// Cancelled, removed, or no longer idle when their turn came.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub items: usize,
    pub total_bytes: u64,
    pub by_status: BTreeMap<StatusKind, usize>,
}

impl QueueStats {
    #[must_use]
    pub fn count(&self, kind: StatusKind) -> usize {
        self.by_status.get(&kind).copied().unwrap_or(0)
    }
}

pub struct UploadScheduler {
    queue: Arc<Mutex<Vec<QueueItem>>>,
    processor: Arc<dyn DocumentProcessor>,
    gate: IngestGate,
    options: ProcessOptions,
    concurrency: usize,
    attempts: AtomicU64,
}

impl std::fmt::Debug for UploadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadScheduler")
            .field("items", &self.lock().len())
            .field("concurrency", &self.concurrency)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl UploadScheduler {
    #[must_use]
    pub fn new(processor: Arc<dyn DocumentProcessor>, gate: IngestGate) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            processor,
            gate,
            options: ProcessOptions::default(),
            concurrency: 10,
            attempts: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, processor: Arc<dyn DocumentProcessor>) -> Self {
        Self::new(processor, IngestGate::new(GateConfig::from_config(config)))
            .with_options(ProcessOptions::from(&config.processor))
            .with_concurrency(config.upload.concurrency)
    }

    #[must_use]
    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    /// Maximum simultaneous uploads in [`start_all`](Self::start_all). Clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `files` through the ingestion gate and prepend the new items.
    pub async fn enqueue(&self, files: Vec<PathedFile>) -> IngestReport {
        let existing: HashSet<String> = self.lock().iter().map(QueueItem::identity_key).collect();
        let outcome = self.gate.ingest(files, &existing).await;

        let mut queue = self.lock();
        let live: HashSet<String> = queue.iter().map(QueueItem::identity_key).collect();
        let fresh: Vec<QueueItem> = outcome
            .items
            .into_iter()
            .filter(|item| {
                let keep = !live.contains(&item.identity_key());
                if !keep {
                    tracing::debug!(file = %item.file.display_path(), "queued concurrently, skipping");
                }
                keep
            })
            .collect();
        queue.splice(0..0, fresh);
        outcome.report
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.lock().clone()
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.lock().iter().find(|item| item.id == id).cloned()
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let queue = self.lock();
        let mut stats = QueueStats {
            items: queue.len(),
            ..QueueStats::default()
        };
        for item in queue.iter() {
            stats.total_bytes += item.file.size();
            *stats.by_status.entry(item.kind()).or_default() += 1;
        }
        stats
    }

    /// Upload one idle item and wait for the attempt to finish.
    ///
    /// Returns the status the attempt settled the item in, or `None` when the
    /// call was a no-op (missing, not idle, or carrying an error) or its
    /// completion was discarded because the attempt was superseded.
    pub async fn start_one(&self, id: ItemId) -> Option<StatusKind> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancelHandle::new();

        let request = {
            let mut queue = self.lock();
            let item = queue.iter_mut().find(|item| item.id == id)?;
            if !matches!(item.status, ItemStatus::Idle) {
                return None;
            }
            item.status = ItemStatus::Uploading {
                cancel: cancel.clone(),
                attempt,
            };
            item.progress = 0;
            self.request_for(item)
        };

        tracing::info!(item = %id, file = %request.file.display_path(), attempt, "upload started");
        let outcome = self
            .processor
            .process(request, self.progress_fn(id, attempt), cancel.token())
            .await;

        let mut queue = self.lock();
        let Some(item) = queue.iter_mut().find(|item| item.id == id) else {
            tracing::debug!(item = %id, "item removed during upload, result dropped");
            return None;
        };
        if !matches!(item.status, ItemStatus::Uploading { attempt: current, .. } if current == attempt) {
            tracing::debug!(item = %id, attempt, "stale completion discarded");
            return None;
        }

        match outcome {
            Ok(raw) => {
                let result = upload_result(raw);
                tracing::info!(
                    item = %id,
                    server_id = result.server_id.as_deref().unwrap_or("-"),
                    tags = ?result.tags,
                    "upload done"
                );
                item.status = ItemStatus::Done(result);
                item.progress = 100;
            }
            Err(ProcessError::Cancelled) => {
                item.status = ItemStatus::Idle;
                item.progress = 0;
            }
            Err(e) => {
                tracing::warn!(item = %id, error = %e, "upload failed");
                item.status = ItemStatus::Error(ItemError::transport(e.to_string()));
            }
        }
        Some(item.kind())
    }

    /// Signal an in-flight upload and return the item to idle. No-op otherwise.
    pub fn cancel_one(&self, id: ItemId) -> bool {
        let mut queue = self.lock();
        let Some(item) = queue.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        let ItemStatus::Uploading { cancel, .. } = &item.status else {
            return false;
        };
        cancel.signal();
        item.status = ItemStatus::Idle;
        item.progress = 0;
        tracing::info!(item = %id, "upload cancelled");
        true
    }

    /// Delete an item, cancelling its upload first if one is running.
    pub fn remove_one(&self, id: ItemId) -> bool {
        let mut queue = self.lock();
        let Some(pos) = queue.iter().position(|item| item.id == id) else {
            return false;
        };
        let item = queue.remove(pos);
        if let Some(cancel) = item.cancel_handle() {
            cancel.signal();
        }
        tracing::debug!(item = %id, file = %item.file.display_path(), "removed");
        true
    }

    /// Reset a finished or transport-failed item and upload it again.
    /// Validation failures are permanent and left untouched.
    pub async fn retry_one(&self, id: ItemId) -> Option<StatusKind> {
        {
            let mut queue = self.lock();
            let item = queue.iter_mut().find(|item| item.id == id)?;
            let retryable = match &item.status {
                ItemStatus::Done(_) => true,
                ItemStatus::Error(err) => err.is_retryable(),
                ItemStatus::Idle | ItemStatus::Uploading { .. } => false,
            };
            if !retryable {
                return None;
            }
            item.status = ItemStatus::Idle;
            item.progress = 0;
        }
        self.start_one(id).await
    }

    /// Edit user metadata. Refused while the item is uploading.
    pub fn set_metadata(&self, id: ItemId, category_name: Option<String>, title: Option<String>) -> bool {
        let mut queue = self.lock();
        let Some(item) = queue.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        if matches!(item.status, ItemStatus::Uploading { .. }) {
            return false;
        }
        if let Some(category_name) = category_name {
            item.category_name = category_name;
        }
        if let Some(title) = title {
            item.title = title;
        }
        true
    }

    /// Upload every item idle at call time, at most `concurrency` at once, in queue order.
    pub async fn start_all(&self) -> BatchReport {
        let ids: Vec<ItemId> = self
            .lock()
            .iter()
            .filter(|item| matches!(item.status, ItemStatus::Idle))
            .map(|item| item.id)
            .collect();
        let mut report = BatchReport {
            scheduled: ids.len(),
            ..BatchReport::default()
        };
        tracing::info!(items = ids.len(), concurrency = self.concurrency, "starting batch");

        let mut outcomes = futures::stream::iter(ids)
            .map(|id| self.start_one(id))
            .buffer_unordered(self.concurrency);
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Some(StatusKind::Done) => report.done += 1,
                Some(StatusKind::Error) => report.failed += 1,
                _ => report.skipped += 1,
            }
        }

        tracing::info!(
            done = report.done,
            failed = report.failed,
            skipped = report.skipped,
            "batch finished"
        );
        report
    }

    fn request_for(&self, item: &QueueItem) -> ProcessRequest {
        let category_name = if item.category_name.trim().is_empty() {
            self.gate.config().default_category.clone()
        } else {
            item.category_name.clone()
        };
        let title = if item.title.trim().is_empty() {
            item.file.stem().to_owned()
        } else {
            item.title.clone()
        };
        ProcessRequest {
            file: Arc::clone(&item.file),
            options: self.options.clone(),
            category_name,
            title,
        }
    }

    fn progress_fn(&self, id: ItemId, attempt: u64) -> ProgressFn {
        let queue = Arc::clone(&self.queue);
        Arc::new(move |percent| {
            let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(item) = queue.iter_mut().find(|item| item.id == id)
                && matches!(item.status, ItemStatus::Uploading { attempt: current, .. } if current == attempt)
            {
                item.progress = item.progress.max(percent.min(100));
            }
        })
    }
}

fn upload_result(raw: Value) -> UploadResult {
    let summary = summary_text(&raw);
    let tags = derive_tags(&summary, &raw);
    let server_id = server_file_id(&raw);
    UploadResult {
        raw,
        summary,
        tags,
        server_id,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use intake_ingest::{ErrorKind, RawFile, tag};
    use serde_json::json;

    use super::*;
    use crate::mock::MockProcessor;

    const MB: usize = 1024 * 1024;

    fn file(rel: &str, size: usize) -> PathedFile {
        let name = rel.rsplit('/').next().unwrap();
        tag(RawFile::from_bytes(name, vec![1u8; size], 42), rel)
    }

    fn scheduler(mock: &MockProcessor) -> UploadScheduler {
        UploadScheduler::new(
            Arc::new(mock.clone()),
            IngestGate::new(GateConfig::default()),
        )
    }

    fn id_of(s: &UploadScheduler, rel: &str) -> ItemId {
        s.snapshot()
            .into_iter()
            .find(|i| i.file.relative_path() == rel)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn enqueue_prepends_newest_batch_and_dedups() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1), file("b.pdf", 1)]).await;
        let report = s.enqueue(vec![file("a.pdf", 1), file("c.pdf", 1)]).await;

        assert_eq!(report.skipped_duplicate, 1);
        let order: Vec<_> = s
            .snapshot()
            .iter()
            .map(|i| i.file.relative_path().to_owned())
            .collect();
        assert_eq!(order, ["c.pdf", "a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn start_one_completes_with_derived_result() {
        let mock = MockProcessor::with_replies(vec![Ok(json!({
            "outDir": "/srv/out/job-9",
            "llmSummary": "예산 보고\n카테고리: 예산, 행정"
        }))]);
        let s = scheduler(&mock);
        s.enqueue(vec![file("reports/a.pdf", 10)]).await;
        let id = id_of(&s, "reports/a.pdf");

        assert_eq!(s.start_one(id).await, Some(StatusKind::Done));
        let item = s.get(id).unwrap();
        assert_eq!(item.progress, 100);
        let result = item.result().unwrap();
        assert_eq!(result.server_id.as_deref(), Some("job-9"));
        assert_eq!(result.tags, ["예산", "행정"]);
        assert!(item.cancel_handle().is_none());
        assert_eq!(mock.calls(), ["reports/a.pdf"]);
    }

    #[tokio::test]
    async fn start_one_is_noop_for_missing_done_and_rejected() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("big.pdf", 90 * MB), file("ok.pdf", 1)]).await;
        let big = id_of(&s, "big.pdf");
        let ok = id_of(&s, "ok.pdf");

        assert_eq!(s.start_one(ItemId::new_v4()).await, None);
        assert_eq!(s.start_one(big).await, None);
        assert_eq!(s.start_one(ok).await, Some(StatusKind::Done));
        assert_eq!(s.start_one(ok).await, None);
        assert_eq!(mock.calls(), ["ok.pdf"]);
    }

    #[tokio::test]
    async fn failure_becomes_transport_error_and_retry_recovers() {
        let mock = MockProcessor::with_replies(vec![Err("HTTP 503 Service Unavailable".into())]);
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1)]).await;
        let id = id_of(&s, "a.pdf");

        assert_eq!(s.start_one(id).await, Some(StatusKind::Error));
        let err = s.get(id).unwrap().error().cloned().unwrap();
        assert_eq!(err.kind, ErrorKind::Transport);
        assert_eq!(err.message, "HTTP 503 Service Unavailable");

        assert_eq!(s.start_one(id).await, None);
        assert_eq!(s.retry_one(id).await, Some(StatusKind::Done));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("big.pdf", 81 * MB)]).await;
        let id = id_of(&s, "big.pdf");
        assert_eq!(s.retry_one(id).await, None);
        assert_eq!(s.get(id).unwrap().kind(), StatusKind::Error);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_returns_item_to_idle() {
        let mock = MockProcessor::default().with_delay(5_000);
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1)]).await;
        let id = id_of(&s, "a.pdf");

        let (outcome, cancelled) = tokio::join!(s.start_one(id), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let observed = s.get(id).unwrap();
            assert_eq!(observed.kind(), StatusKind::Uploading);
            assert_eq!(observed.progress, 10);
            s.cancel_one(id)
        });

        assert!(cancelled);
        assert_eq!(outcome, None);
        let item = s.get(id).unwrap();
        assert_eq!(item.kind(), StatusKind::Idle);
        assert_eq!(item.progress, 0);
        assert!(item.cancel_handle().is_none());
    }

    #[tokio::test]
    async fn late_completion_after_cancel_is_discarded() {
        let mock = MockProcessor::default().with_delay(100).ignoring_cancel();
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1)]).await;
        let id = id_of(&s, "a.pdf");

        let (outcome, _) = tokio::join!(s.start_one(id), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s.cancel_one(id)
        });

        assert_eq!(outcome, None);
        let item = s.get(id).unwrap();
        assert_eq!(item.kind(), StatusKind::Idle);
        assert_eq!(item.progress, 0);
        assert!(item.result().is_none());
    }

    #[tokio::test]
    async fn cancel_is_noop_when_not_uploading() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1)]).await;
        let id = id_of(&s, "a.pdf");
        assert!(s.set_metadata(id, Some("minutes".into()), Some("Q3 minutes".into())));

        assert!(!s.cancel_one(id));
        let idle = s.get(id).unwrap();
        assert_eq!(idle.kind(), StatusKind::Idle);
        assert_eq!(idle.progress, 0);
        assert_eq!(idle.category_name, "minutes");
        assert_eq!(idle.title, "Q3 minutes");
        assert!(idle.cancel_handle().is_none());

        s.start_one(id).await;
        let before = s.get(id).unwrap();
        assert!(!s.cancel_one(id));
        let after = s.get(id).unwrap();
        assert_eq!(after.kind(), StatusKind::Done);
        assert_eq!(after.progress, 100);
        assert_eq!(after.result(), before.result());
        assert_eq!(after.category_name, "minutes");
        assert_eq!(after.title, "Q3 minutes");
        assert!(after.cancel_handle().is_none());
    }

    #[tokio::test]
    async fn remove_cancels_in_flight_upload() {
        let mock = MockProcessor::default().with_delay(5_000);
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1), file("b.pdf", 1)]).await;
        let id = id_of(&s, "a.pdf");

        let (outcome, removed) = tokio::join!(s.start_one(id), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            s.remove_one(id)
        });

        assert!(removed);
        assert_eq!(outcome, None);
        assert!(s.get(id).is_none());
        assert_eq!(s.snapshot().len(), 1);
        assert!(!s.remove_one(id));
    }

    #[tokio::test]
    async fn start_all_respects_concurrency_ceiling() {
        let mock = MockProcessor::default().with_delay(30);
        let s = scheduler(&mock).with_concurrency(4);
        let files: Vec<_> = (0..12).map(|i| file(&format!("f{i:02}.pdf"), 1)).collect();
        s.enqueue(files).await;

        let report = s.start_all().await;
        assert_eq!(
            report,
            BatchReport {
                scheduled: 12,
                done: 12,
                ..BatchReport::default()
            }
        );
        assert!(mock.max_in_flight() <= 4);
        assert!(mock.max_in_flight() >= 2);
        assert_eq!(s.stats().count(StatusKind::Done), 12);
    }

    #[tokio::test]
    async fn start_all_ignores_items_enqueued_after_snapshot() {
        let mock = MockProcessor::default().with_delay(100);
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 1), file("big.pdf", 90 * MB)]).await;

        let (report, _) = tokio::join!(s.start_all(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s.enqueue(vec![file("late.pdf", 1)]).await
        });

        assert_eq!(report.scheduled, 1);
        assert_eq!(report.done, 1);
        let late = id_of(&s, "late.pdf");
        assert_eq!(s.get(late).unwrap().kind(), StatusKind::Idle);
        assert_eq!(s.get(id_of(&s, "big.pdf")).unwrap().kind(), StatusKind::Error);
    }

    #[tokio::test]
    async fn start_all_counts_failures() {
        let mock = MockProcessor::with_replies(vec![Err("boom".into())]);
        let s = scheduler(&mock).with_concurrency(1);
        s.enqueue(vec![file("a.pdf", 1), file("b.pdf", 1)]).await;
        let report = s.start_all().await;
        assert_eq!((report.done, report.failed), (1, 1));
    }

    #[tokio::test]
    async fn request_uses_item_metadata_with_fallbacks() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("reports/q3 plan.pdf", 1)]).await;
        let id = id_of(&s, "reports/q3 plan.pdf");

        assert!(s.set_metadata(id, Some(String::new()), Some("  ".into())));
        let item = s.get(id).unwrap();
        let request = s.request_for(&item);
        assert_eq!(request.category_name, "Uncategorized");
        assert_eq!(request.title, "q3 plan");

        assert!(s.set_metadata(id, Some("finance".into()), Some("Q3".into())));
        let request = s.request_for(&s.get(id).unwrap());
        assert_eq!((request.category_name.as_str(), request.title.as_str()), ("finance", "Q3"));
    }

    #[tokio::test]
    async fn stats_count_bytes_and_statuses() {
        let mock = MockProcessor::default();
        let s = scheduler(&mock);
        s.enqueue(vec![file("a.pdf", 10), file("b.pdf", 20), file("big.pdf", 90 * MB)])
            .await;
        s.start_one(id_of(&s, "a.pdf")).await;

        let stats = s.stats();
        assert_eq!(stats.items, 3);
        assert_eq!(stats.total_bytes, 30 + 90 * MB as u64);
        assert_eq!(stats.count(StatusKind::Done), 1);
        assert_eq!(stats.count(StatusKind::Idle), 1);
        assert_eq!(stats.count(StatusKind::Error), 1);
        assert_eq!(stats.count(StatusKind::Uploading), 0);
    }

    #[test]
    fn from_config_applies_sections() {
        let mut config = Config::default();
        config.upload.concurrency = 3;
        config.processor.dpi = 200;
        let s = UploadScheduler::from_config(&config, Arc::new(MockProcessor::default()));
        assert_eq!(s.concurrency(), 3);
        assert_eq!(s.options.dpi, 200);
    }
}
