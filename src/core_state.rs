//! Transport-agnostic service state.
//!
//! `CoreState` owns the ingestion orchestrator and the history store it
//! appends to. Built once at startup and shared behind an `Arc` by every
//! request handler.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::{DatabaseError, HistoryStore, SqliteHistoryStore};
use crate::pipeline::extraction::ocr::DocumentAnalysisClient;
use crate::pipeline::extraction::OcrError;
use crate::pipeline::ingest::IngestionOrchestrator;
use crate::pipeline::structuring::{
    AiMedicationParser, ChatCompletionClient, LlmClient, RuleBasedExtractor, StructuringError,
};

/// Errors raised while starting or running the service.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("OCR client setup failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("AI client setup failed: {0}")]
    Structuring(#[from] StructuringError),
    #[error("Startup task failed: {0}")]
    Startup(String),
    #[error("Server error: {0}")]
    Server(String),
}

pub struct CoreState {
    pub orchestrator: IngestionOrchestrator,
    pub store: Arc<dyn HistoryStore + Send + Sync>,
    /// Request-level budget for one ingestion, independent of OCR polling.
    pub ingest_timeout: Duration,
}

impl CoreState {
    /// Wire production components from configuration.
    ///
    /// Missing OCR or AI credentials do not fail startup: the affected
    /// stage reports `ServiceUnavailable` when it is called.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let store: Arc<dyn HistoryStore + Send + Sync> = Arc::new(SqliteHistoryStore::open(
            Path::new(&config.server.database_path),
        )?);

        let recognizer = DocumentAnalysisClient::new(&config.ocr)?;

        let llm = ChatCompletionClient::from_config(&config.ai)?
            .map(|client| Box::new(client) as Box<dyn LlmClient + Send + Sync>);
        if llm.is_none() {
            tracing::warn!("AI_API_KEY not set; AI parsing disabled, rule-based fallback only");
        }
        let parser = AiMedicationParser::new(llm);

        let orchestrator = IngestionOrchestrator::new(
            Arc::new(recognizer),
            Arc::new(parser),
            Arc::new(RuleBasedExtractor),
            Arc::clone(&store),
        );

        Ok(Self {
            orchestrator,
            store,
            ingest_timeout: config.server.ingest_timeout,
        })
    }

    /// Assemble from already-built parts (tests, alternative transports).
    pub fn new(
        orchestrator: IngestionOrchestrator,
        store: Arc<dyn HistoryStore + Send + Sync>,
        ingest_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            store,
            ingest_timeout,
        }
    }
}
