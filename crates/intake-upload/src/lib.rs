//! Upload half of the intake pipeline: the document-processor collaborator and
//! the scheduler that drives it.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod processor;
pub mod scheduler;
pub mod tags;

pub use error::ProcessError;
pub use http::HttpProcessor;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockProcessor;
pub use processor::{DocumentProcessor, ProcessOptions, ProcessRequest, ProgressFn};
pub use scheduler::{BatchReport, QueueStats, UploadScheduler};
