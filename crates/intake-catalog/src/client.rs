use std::collections::BTreeSet;
use std::time::Duration;

use intake_core::config::CatalogConfig;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub categories: Vec<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            categories: Vec::new(),
            page: 1,
            page_size: 20,
        }
    }
}

/// One stored document as listed by the search endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub server_file_id: Option<String>,
    /// ISO string or epoch milliseconds, as the store reports it.
    #[serde(default)]
    pub created_at: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(serde_json::Number),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    IdRepr::deserialize(d).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<IdRepr>::deserialize(d)?.map(String::from))
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<CatalogDocument>,
    #[serde(default)]
    total: u64,
    categories: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<CatalogDocument>,
    pub total: u64,
    /// Server-provided category list, or the sorted distinct tags of `items`.
    pub categories: Vec<String>,
    pub page: u32,
    pub page_size: u32,
}

impl SearchPage {
    #[must_use]
    pub fn page_count(&self) -> u64 {
        let size = u64::from(self.page_size.max(1));
        self.total.div_ceil(size).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Text,
    Json,
}

impl DownloadKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Client for the document store's search and download routes.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base: Url,
}

impl CatalogClient {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL that can carry a path.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, CatalogError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::InvalidBase(base_url.to_owned()));
        }
        Ok(Self { client, base })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is invalid.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = intake_core::http::build_client(Some(Duration::from_secs(30)))?;
        Self::new(client, &config.base_url)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    #[must_use]
    pub fn search_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint(&["docs", "search"]);
        {
            let mut pairs = url.query_pairs_mut();
            if !query.q.is_empty() {
                pairs.append_pair("q", &query.q);
            }
            if !query.categories.is_empty() {
                pairs.append_pair("categories", &query.categories.join(","));
            }
            pairs.append_pair("page", &query.page.to_string());
            pairs.append_pair("pageSize", &query.page_size.to_string());
        }
        url
    }

    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or an
    /// unparseable body.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, CatalogError> {
        let url = self.search_url(query);
        tracing::debug!(%url, "searching catalog");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status {
                status: resp.status().as_u16(),
                context: "search",
            });
        }
        let body: SearchResponse = resp.json().await?;

        let categories = body.categories.unwrap_or_else(|| {
            body.items
                .iter()
                .flat_map(|doc| doc.tags.iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        });
        Ok(SearchPage {
            items: body.items,
            total: body.total,
            categories,
            page: query.page,
            page_size: query.page_size,
        })
    }

    #[must_use]
    pub fn download_url(&self, server_file_id: &str, kind: DownloadKind) -> Url {
        self.endpoint(&["download", server_file_id, kind.as_str()])
    }

    /// Fetch the stored OCR text.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-success status.
    pub async fn fetch_text(&self, server_file_id: &str) -> Result<String, CatalogError> {
        let resp = self
            .client
            .get(self.download_url(server_file_id, DownloadKind::Text))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status {
                status: resp.status().as_u16(),
                context: "text download",
            });
        }
        Ok(resp.text().await?)
    }

    /// Fetch the stored processing result as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or invalid JSON.
    pub async fn fetch_json(&self, server_file_id: &str) -> Result<Value, CatalogError> {
        let resp = self
            .client
            .get(self.download_url(server_file_id, DownloadKind::Json))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CatalogError::Status {
                status: resp.status().as_u16(),
                context: "json download",
            });
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
