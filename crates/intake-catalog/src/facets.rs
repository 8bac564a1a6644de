use std::collections::BTreeSet;

use intake_ingest::{ItemId, QueueItem};
use serde::Serialize;

/// Sorted distinct category names and tags over completed items.
#[must_use]
pub fn facets(items: &[QueueItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.result().map(|result| (item, result)))
        .flat_map(|(item, result)| {
            std::iter::once(item.category_name.as_str())
                .chain(result.tags.iter().map(String::as_str))
        })
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn labels(item: &QueueItem) -> Vec<&str> {
    let mut labels: Vec<&str> = item
        .result()
        .map(|r| r.tags.iter().map(String::as_str).collect())
        .unwrap_or_default();
    if !item.category_name.is_empty() {
        labels.push(&item.category_name);
    }
    labels
}

/// Lower-cased file name, summary, labels, and title joined by spaces.
#[must_use]
pub fn searchable_text(item: &QueueItem) -> String {
    let summary = item.result().map_or("", |r| r.summary.as_str());
    [
        item.file.name(),
        summary,
        labels(item).join(" ").as_str(),
        item.title.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub query: String,
    pub required_tags: Vec<String>,
}

impl ItemFilter {
    /// Every required tag must be among the item's labels, and the query must
    /// occur in its searchable text, ignoring case.
    #[must_use]
    pub fn matches(&self, item: &QueueItem) -> bool {
        let labels = labels(item);
        if !self
            .required_tags
            .iter()
            .all(|tag| labels.contains(&tag.as_str()))
        {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        query.is_empty() || searchable_text(item).contains(&query)
    }

    pub fn apply<'a>(&'a self, items: &'a [QueueItem]) -> impl Iterator<Item = &'a QueueItem> {
        items.iter().filter(|item| self.matches(item))
    }
}

/// Flat view of a completed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub id: ItemId,
    pub title: String,
    pub filename: String,
    pub relative_path: String,
    pub size: u64,
    pub category: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub server_file_id: Option<String>,
}

#[must_use]
pub fn summaries(items: &[QueueItem]) -> Vec<ResultSummary> {
    items
        .iter()
        .filter_map(|item| {
            let result = item.result()?;
            Some(ResultSummary {
                id: item.id,
                title: item.title.clone(),
                filename: item.file.name().to_owned(),
                relative_path: item.file.relative_path().to_owned(),
                size: item.file.size(),
                category: item.category_name.clone(),
                tags: result.tags.clone(),
                summary: result.summary.clone(),
                server_file_id: result.server_id.clone(),
            })
        })
        .collect()
}
