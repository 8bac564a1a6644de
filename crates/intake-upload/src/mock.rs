//! Test-only mock document processor.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::processor::{DocumentProcessor, ProcessRequest, ProgressFn};

/// Scripted reply for one call. `Err` becomes [`ProcessError::Other`].
pub type MockReply = Result<Value, String>;

#[derive(Debug, Clone)]
pub struct MockProcessor {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    pub default_response: Value,
    /// Milliseconds to sleep before replying.
    pub delay_ms: u64,
    /// Keep running after cancellation and reply anyway.
    pub ignore_cancel: bool,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            default_response: serde_json::json!({
                "id": "mock-id",
                "llmSummary": "mock summary\nCategory: mock"
            }),
            delay_ms: 0,
            ignore_cancel: false,
        }
    }
}

impl MockProcessor {
    #[must_use]
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// Relative paths of every request received, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneous calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DocumentProcessor for MockProcessor {
    fn process(
        &self,
        request: ProcessRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ProcessError>> + Send + '_>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(request.file.relative_path().to_owned());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(Arc::clone(&self.in_flight));

            progress(10);
            let delay = tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms));
            if self.ignore_cancel {
                delay.await;
            } else {
                tokio::select! {
                    () = cancel.cancelled() => return Err(ProcessError::Cancelled),
                    () = delay => {}
                }
            }
            progress(100);

            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(ProcessError::Other(message)),
                None => Ok(self.default_response.clone()),
            }
        })
    }
}
