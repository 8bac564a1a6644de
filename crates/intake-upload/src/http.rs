use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use intake_core::config::ProcessorConfig;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::processor::{DocumentProcessor, ProcessRequest, ProgressFn, error_message};

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Multipart client for the OCR/summarization endpoint.
pub struct HttpProcessor {
    client: reqwest::Client,
    url: String,
}

impl HttpProcessor {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, endpoint: &str) -> Self {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Self { client, url }
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ProcessorConfig) -> reqwest::Result<Self> {
        let client = intake_core::http::build_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(Self::new(client, &config.base_url, &config.endpoint))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: ProcessRequest, progress: ProgressFn) -> Result<Value, ProcessError> {
        let bytes = request.file.file().read().await?;
        let len = bytes.len() as u64;

        let part = Part::stream_with_length(progress_body(bytes, progress), len)
            .file_name(request.file.name().to_owned())
            .mime_str("application/octet-stream")?;
        let form = request
            .fields()
            .into_iter()
            .fold(Form::new().part("file", part), |form, (name, value)| {
                form.text(name, value)
            });

        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        parse_response(status, &text)
    }
}

impl std::fmt::Debug for HttpProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProcessor")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl DocumentProcessor for HttpProcessor {
    fn process(
        &self,
        request: ProcessRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ProcessError>> + Send + '_>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ProcessError::Cancelled),
                result = self.send(request, progress) => result,
            }
        })
    }
}

/// Stream `data` in fixed chunks, reporting the share handed to the transport.
fn progress_body(data: Vec<u8>, progress: ProgressFn) -> reqwest::Body {
    let total = data.len();
    let stream = futures::stream::unfold(0usize, move |offset| {
        let next = (offset < total).then(|| {
            let end = (offset + UPLOAD_CHUNK).min(total);
            progress(percent(end, total));
            (Ok::<_, std::io::Error>(data[offset..end].to_vec()), end)
        });
        futures::future::ready(next)
    });
    reqwest::Body::wrap_stream(stream)
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(done.saturating_mul(100) / total).unwrap_or(100)
}

fn parse_response(status: StatusCode, text: &str) -> Result<Value, ProcessError> {
    let body: Option<Value> = serde_json::from_str(text).ok();
    if !status.is_success() {
        let message = error_message(body.as_ref(), || match status.canonical_reason() {
            Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        });
        return Err(ProcessError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body.unwrap_or_else(|| serde_json::json!({ "raw": text })))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use intake_ingest::{RawFile, tag};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::processor::ProcessOptions;

    fn request(size: usize) -> ProcessRequest {
        let raw = RawFile::from_bytes("scan.pdf", vec![b'x'; size], 0);
        ProcessRequest {
            file: Arc::new(tag(raw, "reports/scan.pdf")),
            options: ProcessOptions::default(),
            category_name: "reports".into(),
            title: "scan".into(),
        }
    }

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Arc::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    fn processor(server: &MockServer) -> HttpProcessor {
        HttpProcessor::new(reqwest::Client::new(), &server.uri(), "/ocr/tesseract")
    }

    #[test]
    fn joins_base_and_endpoint() {
        let p = HttpProcessor::new(reqwest::Client::new(), "http://h:4000/", "/ocr/tesseract");
        assert_eq!(p.url(), "http://h:4000/ocr/tesseract");
        assert!(format!("{p:?}").contains("ocr/tesseract"));
    }

    #[test]
    fn percent_bounds() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(10, 10), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn error_body_message_and_fallback() {
        let err = parse_response(StatusCode::BAD_REQUEST, r#"{"detail":"no pages"}"#).unwrap_err();
        assert!(matches!(err, ProcessError::Http { status: 400, .. }));
        assert_eq!(err.to_string(), "no pages");

        let err = parse_response(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn non_json_success_is_wrapped() {
        let value = parse_response(StatusCode::OK, "plain ok").unwrap();
        assert_eq!(value, serde_json::json!({"raw": "plain ok"}));
    }

    #[tokio::test]
    async fn posts_multipart_form_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ocr/tesseract"))
            .and(body_string_contains("name=\"relpath\""))
            .and(body_string_contains("reports/scan.pdf"))
            .and(body_string_contains("name=\"title_override\""))
            .and(body_string_contains("gemma3-summarizer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "srv-1",
                "llmSummary": "카테고리: 예산"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (progress, seen) = recorder();
        let value = processor(&server)
            .process(request(200 * 1024), progress, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(value["id"], "srv-1");
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn server_error_maps_to_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "ocr crashed"})),
            )
            .mount(&server)
            .await;

        let (progress, _) = recorder();
        let err = processor(&server)
            .process(request(10), progress, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Http { status: 500, .. }));
        assert_eq!(err.to_string(), "ocr crashed");
    }

    #[tokio::test]
    async fn cancellation_wins_over_slow_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let (progress, _) = recorder();
        let err = processor(&server)
            .process(request(10), progress, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let p = HttpProcessor::new(reqwest::Client::new(), "http://127.0.0.1:1", "/ocr");
        let (progress, _) = recorder();
        let err = p
            .process(request(10), progress, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Transport(_)));
    }
}
