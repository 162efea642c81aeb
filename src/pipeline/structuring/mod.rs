pub mod types;
pub mod prompt;
pub mod llm;
pub mod parser;
pub mod sanitize;
pub mod rule_based;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use llm::*;
pub use parser::*;
pub use sanitize::*;
pub use rule_based::*;
pub use orchestrator::*;

use thiserror::Error;

/// Failures of the AI parsing stage. The ingestion pipeline recovers from
/// every variant by falling back to rule-based extraction.
#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("AI parser not configured: {0}")]
    ServiceUnavailable(String),

    #[error("AI completion request failed (status {status}): {body}")]
    UpstreamRequest { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unusable AI completion: {0}")]
    UpstreamContent(String),
}
