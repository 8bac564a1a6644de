//! What happens after upload: facets and filtering over finished items, and
//! the client for the remote document store.

pub mod client;
pub mod error;
pub mod facets;

pub use client::{CatalogClient, CatalogDocument, DownloadKind, SearchPage, SearchQuery};
pub use error::CatalogError;
pub use facets::{ItemFilter, ResultSummary, facets, searchable_text, summaries};
