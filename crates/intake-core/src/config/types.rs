use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Remote OCR/summarization endpoint and the parameter bundle sent with every upload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_processor_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_prep")]
    pub prep: String,
    #[serde(default = "default_langs")]
    pub langs: String,
    #[serde(default = "default_psm")]
    pub psm: u32,
    #[serde(default = "default_true")]
    pub summarize: bool,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:4000".into()
}

fn default_processor_endpoint() -> String {
    "/ocr/tesseract".into()
}

fn default_dpi() -> u32 {
    300
}

fn default_prep() -> String {
    "adaptive".into()
}

fn default_langs() -> String {
    "kor+eng".into()
}

fn default_psm() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

fn default_summary_model() -> String {
    "gemma3-summarizer".into()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: default_processor_endpoint(),
            dpi: default_dpi(),
            prep: default_prep(),
            langs: default_langs(),
            psm: default_psm(),
            summarize: default_true(),
            summary_model: default_summary_model(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Accepted extensions, without the leading dot. `zip` enables archive expansion.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
    #[serde(default = "default_max_walk_entries")]
    pub max_walk_entries: usize,
    #[serde(default = "default_max_archive_depth")]
    pub max_archive_depth: usize,
    /// Entries requested per call when walking legacy directory readers.
    #[serde(default = "default_entry_batch_size")]
    pub entry_batch_size: usize,
}

pub(crate) fn default_allowed_extensions() -> Vec<String> {
    [
        "pdf", "hwp", "hwpx", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "zip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_size_mb() -> u64 {
    80
}

fn default_max_walk_depth() -> usize {
    64
}

fn default_max_walk_entries() -> usize {
    100_000
}

fn default_max_archive_depth() -> usize {
    2
}

fn default_entry_batch_size() -> usize {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_size_mb: default_max_size_mb(),
            max_walk_depth: default_max_walk_depth(),
            max_walk_entries: default_max_walk_entries(),
            max_archive_depth: default_max_archive_depth(),
            entry_batch_size: default_entry_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Maximum number of simultaneously in-flight uploads.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_category")]
    pub default_category: String,
}

fn default_concurrency() -> usize {
    10
}

fn default_category() -> String {
    "Uncategorized".into()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_category: default_category(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
