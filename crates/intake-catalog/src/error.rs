#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context} failed ({status})")]
    Status { status: u16, context: &'static str },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("base URL cannot carry a path: {0}")]
    InvalidBase(String),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),
}
