use std::time::Duration;

use super::OcrError;

/// Outcome of a single poll of a running analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    Running,
    Succeeded { content: String },
    Failed { message: String },
}

/// Text recognition abstraction (allows mocking for tests)
pub trait TextRecognizer {
    fn extract_text(&self, file_bytes: &[u8], mime_type: &str) -> Result<String, OcrError>;
}

/// Wire-level access to a long-running document analysis service.
pub trait AnalysisTransport {
    /// Submit a document; returns the opaque operation location to poll.
    fn submit(&self, file_bytes: &[u8], mime_type: &str) -> Result<String, OcrError>;

    fn poll(&self, operation_location: &str) -> Result<AnalysisStatus, OcrError>;
}

/// Wait between polls. Injected so tests can poll with no real delay.
pub trait PollDelay {
    fn wait(&self, interval: Duration);
}

/// Blocks the current thread for the poll interval.
pub struct ThreadSleep;

impl PollDelay for ThreadSleep {
    fn wait(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Returns immediately.
pub struct NoDelay;

impl PollDelay for NoDelay {
    fn wait(&self, _interval: Duration) {}
}
