//! Document-processor collaborator: the trait the scheduler drives, plus
//! helpers for reading its responses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use intake_core::config::ProcessorConfig;
use intake_ingest::PathedFile;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;

/// Upload progress callback, called with a percentage in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// OCR and summarization parameters sent with every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    pub dpi: u32,
    pub prep: String,
    pub langs: String,
    pub psm: u32,
    pub summarize: bool,
    pub summary_model: String,
}

impl From<&ProcessorConfig> for ProcessOptions {
    fn from(config: &ProcessorConfig) -> Self {
        Self {
            dpi: config.dpi,
            prep: config.prep.clone(),
            langs: config.langs.clone(),
            psm: config.psm,
            summarize: config.summarize,
            summary_model: config.summary_model.clone(),
        }
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::from(&ProcessorConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub file: Arc<PathedFile>,
    pub options: ProcessOptions,
    pub category_name: String,
    pub title: String,
}

impl ProcessRequest {
    /// Form fields in submission order, excluding the file part.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(9);
        let relpath = self.file.file().native_path().unwrap_or(self.file.relative_path());
        if !relpath.is_empty() {
            fields.push(("relpath", relpath.to_owned()));
        }
        fields.extend([
            ("dpi", self.options.dpi.to_string()),
            ("prep", self.options.prep.clone()),
            ("langs", self.options.langs.clone()),
            ("psm", self.options.psm.to_string()),
            ("do_llm_summary", self.options.summarize.to_string()),
            ("llm_model", self.options.summary_model.clone()),
            ("category_name", self.category_name.clone()),
            ("title_override", self.title.clone()),
        ]);
        fields
    }
}

/// Sends one document to the processing service.
pub trait DocumentProcessor: Send + Sync {
    /// Upload `request`, reporting progress, until completion or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Cancelled`] when `cancel` fires first, or the
    /// transport or server failure otherwise.
    fn process(
        &self,
        request: ProcessRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ProcessError>> + Send + '_>>;
}

/// Server-side id: `id`, `file_id`, or the last segment of `outDir`.
#[must_use]
pub fn server_file_id(response: &Value) -> Option<String> {
    for key in ["id", "file_id"] {
        match response.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    let out_dir = ["outDir", "outdir"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())?;
    out_dir
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// LLM summary text, empty when the service did not summarize.
#[must_use]
pub fn summary_text(response: &Value) -> String {
    response
        .get("llmSummary")
        .and_then(Value::as_str)
        .or_else(|| response.get("llm_summary").and_then(Value::as_str))
        .or_else(|| response.pointer("/llm/summary_text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned()
}

/// Failure message from an error body: `detail`, `error`, `message`, else `fallback`.
#[must_use]
pub fn error_message(body: Option<&Value>, fallback: impl FnOnce() -> String) -> String {
    body.and_then(|body| {
        ["detail", "error", "message"]
            .iter()
            .find_map(|key| match body.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Null | Value::Bool(false)) | None => None,
                Some(other) => Some(other.to_string()),
            })
    })
    .unwrap_or_else(fallback)
}
