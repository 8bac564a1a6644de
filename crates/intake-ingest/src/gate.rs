use std::collections::{HashSet, VecDeque};

use intake_core::config::Config;

use crate::container::ContainerExpander;
use crate::item::{ItemError, QueueItem};
use crate::pathed::PathedFile;
use crate::policy::{ExtensionPolicy, FileClass};

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub policy: ExtensionPolicy,
    pub max_size_mb: u64,
    pub default_category: String,
    pub max_archive_depth: usize,
}

impl GateConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: ExtensionPolicy::from_config(&config.ingest),
            max_size_mb: config.ingest.max_size_mb,
            default_category: config.upload.default_category.clone(),
            max_archive_depth: config.ingest.max_archive_depth,
        }
    }

    #[must_use]
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters for one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected_oversize: usize,
    pub skipped_duplicate: usize,
    pub skipped_unsupported: usize,
    pub archives_expanded: usize,
    pub archives_failed: usize,
}

#[derive(Debug)]
pub struct IngestOutcome {
    /// New items in candidate order, ready to be prepended to the queue.
    pub items: Vec<QueueItem>,
    pub report: IngestReport,
}

/// Validates and deduplicates candidate files into queue items.
#[derive(Debug, Clone)]
pub struct IngestGate {
    config: GateConfig,
    expander: ContainerExpander,
}

impl IngestGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        let expander = ContainerExpander::new(config.max_archive_depth, config.max_size_bytes());
        Self { config, expander }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Turn `candidates` into queue items, skipping anything whose identity key
    /// is in `existing` or appeared earlier in the batch.
    ///
    /// Archives are replaced in place by their entries. An archive that cannot
    /// be read is logged and contributes nothing.
    pub async fn ingest(
        &self,
        candidates: Vec<PathedFile>,
        existing: &HashSet<String>,
    ) -> IngestOutcome {
        let mut report = IngestReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut work: VecDeque<(PathedFile, bool)> =
            candidates.into_iter().map(|f| (f, false)).collect();

        while let Some((file, from_archive)) = work.pop_front() {
            let class = self.config.policy.classify(file.name());

            if class == FileClass::Container && !from_archive {
                match self.expander.expand(&file).await {
                    Ok(entries) => {
                        report.archives_expanded += 1;
                        for entry in entries.into_iter().rev() {
                            work.push_front((entry, true));
                        }
                    }
                    Err(e) => {
                        report.archives_failed += 1;
                        tracing::warn!(
                            archive = %file.display_path(),
                            error = %e,
                            "failed to expand archive"
                        );
                    }
                }
                continue;
            }

            let key = file.identity_key();
            if existing.contains(&key) || seen.contains(&key) {
                report.skipped_duplicate += 1;
                continue;
            }
            if class != FileClass::Document {
                report.skipped_unsupported += 1;
                continue;
            }
            seen.insert(key);

            let category = file
                .top_folder()
                .unwrap_or(&self.config.default_category)
                .to_owned();
            let title = file.stem().to_owned();

            if file.size() > self.config.max_size_bytes() {
                let message = format!(
                    "file too large ({} > {} MB)",
                    pretty_bytes(file.size()),
                    self.config.max_size_mb
                );
                tracing::debug!(file = %file.display_path(), %message, "rejected");
                report.rejected_oversize += 1;
                items.push(QueueItem::rejected(
                    file,
                    category,
                    title,
                    ItemError::validation(message),
                ));
            } else {
                report.accepted += 1;
                items.push(QueueItem::new(file, category, title));
            }
        }

        tracing::info!(
            accepted = report.accepted,
            oversize = report.rejected_oversize,
            duplicates = report.skipped_duplicate,
            unsupported = report.skipped_unsupported,
            archives = report.archives_expanded,
            archives_failed = report.archives_failed,
            "ingested batch"
        );
        IngestOutcome { items, report }
    }
}

/// Human-readable size with one decimal, base 1024 (`90.0 MB`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if n == 0 {
        return "0 B".into();
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
