pub mod types;
pub mod ocr;

pub use types::*;
pub use ocr::*;

use thiserror::Error;

/// Failures of the OCR stage. None of these are recovered by the pipeline.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR service not configured: {0}")]
    ServiceUnavailable(String),

    #[error("OCR submission rejected (status {status}): {body}")]
    UpstreamSubmission { status: u16, body: String },

    #[error("OCR service protocol error: {0}")]
    UpstreamProtocol(String),

    #[error("OCR analysis failed: {0}")]
    UpstreamAnalysis(String),

    #[error("OCR analysis did not finish after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
