//! Document ingestion orchestrator.
//!
//! Drives one upload through: validate → OCR → AI parse → (rule-based
//! fallback) → append to patient history.
//!
//! OCR failures abort the upload and nothing is persisted. AI-parser failures
//! never abort: the rule-based extractor always produces a (possibly empty)
//! result. All collaborators are injected as traits so the pipeline is fully
//! testable with mocks.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::{DatabaseError, HistoryStore};
use crate::models::{MedicalHistoryRecord, ParsedBy};
use crate::pipeline::extraction::{OcrError, TextRecognizer};
use crate::pipeline::structuring::{
    truncate_chars, FallbackExtractor, MedicationParsing, ParsedMedications,
};

/// Stored OCR text is cut to this many characters.
pub const MAX_STORED_TEXT_CHARS: usize = 10_000;

/// Language tag used when no parser could determine one.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Accepted upload MIME types.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/tiff",
    "application/pdf",
];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error("Text extraction failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Failed to store history record: {0}")]
    Storage(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// MIME validation
// ---------------------------------------------------------------------------

/// Lower-cased MIME essence (`type/subtype`) if it is on the allow-list.
/// `image/jpg` is accepted as an alias of `image/jpeg`.
pub fn normalize_mime_type(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let essence = if essence == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        essence
    };
    ALLOWED_MIME_TYPES.iter().copied().find(|allowed| *allowed == essence)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// One upload as received at the boundary.
pub struct UploadedDocument<'a> {
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

/// Orchestrates ingestion: OCR → parse → persist.
pub struct IngestionOrchestrator {
    recognizer: Arc<dyn TextRecognizer + Send + Sync>,
    parser: Arc<dyn MedicationParsing + Send + Sync>,
    fallback: Arc<dyn FallbackExtractor + Send + Sync>,
    store: Arc<dyn HistoryStore + Send + Sync>,
}

impl IngestionOrchestrator {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer + Send + Sync>,
        parser: Arc<dyn MedicationParsing + Send + Sync>,
        fallback: Arc<dyn FallbackExtractor + Send + Sync>,
        store: Arc<dyn HistoryStore + Send + Sync>,
    ) -> Self {
        Self {
            recognizer,
            parser,
            fallback,
            store,
        }
    }

    /// Run the full pipeline for one upload and return the appended record.
    pub fn ingest(
        &self,
        patient_id: &str,
        document: UploadedDocument<'_>,
    ) -> Result<MedicalHistoryRecord, IngestError> {
        let mime_type = normalize_mime_type(document.mime_type)
            .ok_or_else(|| IngestError::UnsupportedMediaType(document.mime_type.to_string()))?;
        tracing::debug!(
            patient_id,
            file_name = document.file_name,
            mime_type,
            bytes = document.bytes.len(),
            "Upload validated"
        );

        let extracted_text = self
            .recognizer
            .extract_text(document.bytes, mime_type)
            .map_err(|e| {
                tracing::warn!(patient_id, error = %e, "OCR stage failed");
                e
            })?;
        tracing::debug!(patient_id, chars = extracted_text.chars().count(), "OCR done");

        let (parsed, parsed_by) = self.parse(patient_id, &extracted_text);

        let record = MedicalHistoryRecord {
            id: Uuid::new_v4(),
            source_file_name: document.file_name.to_string(),
            source_mime_type: document.mime_type.to_string(),
            extracted_text: truncate_chars(&extracted_text, MAX_STORED_TEXT_CHARS),
            medications: parsed.medications,
            detected_language: parsed.detected_language,
            parsed_by,
            uploaded_at: Utc::now(),
        };

        self.store.append(patient_id, &record)?;
        tracing::info!(
            patient_id,
            record_id = %record.id,
            parsed_by = parsed_by.as_str(),
            medications = record.medications.len(),
            "Medical document ingested"
        );
        Ok(record)
    }

    /// AI parse with rule-based fallback. Never fails.
    ///
    /// An AI result with zero medications also falls back, so "the model found
    /// nothing" and "the model failed" end up on the same path.
    fn parse(&self, patient_id: &str, text: &str) -> (ParsedMedications, ParsedBy) {
        let ai_result = match self.parser.parse_medications(text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "AI parsing failed, using rule-based extraction");
                None
            }
        };

        match ai_result {
            Some(parsed) if !parsed.medications.is_empty() => (parsed, ParsedBy::Ai),
            other => {
                let detected_language = other
                    .map(|p| p.detected_language)
                    .filter(|lang| !lang.is_empty())
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
                let medications = self.fallback.extract(text);
                tracing::debug!(patient_id, medications = medications.len(), "Rule-based parse done");
                (
                    ParsedMedications {
                        detected_language,
                        medications,
                    },
                    ParsedBy::RuleBased,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::db::SqliteHistoryStore;
    use crate::models::MedicationEntry;
    use crate::pipeline::extraction::{
        AnalysisStatus, DocumentAnalysisClient, MockAnalysisTransport, NoDelay,
    };
    use crate::pipeline::structuring::{
        AiMedicationParser, MockLlmClient, RuleBasedExtractor, StructuringError,
    };

    struct Harness {
        orchestrator: IngestionOrchestrator,
        store: Arc<SqliteHistoryStore>,
        ocr_submits: Arc<AtomicUsize>,
    }

    fn harness_with(
        transport: MockAnalysisTransport,
        parser: Arc<dyn MedicationParsing + Send + Sync>,
        fallback: Arc<dyn FallbackExtractor + Send + Sync>,
    ) -> Harness {
        let ocr_submits = transport.submit_counter();
        let recognizer = DocumentAnalysisClient::with_transport(
            Box::new(transport),
            Box::new(NoDelay),
            Duration::from_millis(1200),
            20,
        );
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let orchestrator = IngestionOrchestrator::new(
            Arc::new(recognizer),
            parser,
            fallback,
            store.clone(),
        );
        Harness {
            orchestrator,
            store,
            ocr_submits,
        }
    }

    fn harness(ocr_text: &str, parser: AiMedicationParser) -> Harness {
        harness_with(
            MockAnalysisTransport::succeeding(ocr_text),
            Arc::new(parser),
            Arc::new(RuleBasedExtractor),
        )
    }

    fn upload<'a>(mime_type: &'a str) -> UploadedDocument<'a> {
        UploadedDocument {
            file_name: "scan.png",
            mime_type,
            bytes: b"\x89PNG fake",
        }
    }

    struct CountingFallback(Arc<AtomicUsize>);

    impl FallbackExtractor for CountingFallback {
        fn extract(&self, raw_text: &str) -> Vec<MedicationEntry> {
            self.0.fetch_add(1, Ordering::SeqCst);
            RuleBasedExtractor.extract(raw_text)
        }
    }

    struct FailingParser;

    impl MedicationParsing for FailingParser {
        fn parse_medications(&self, _raw: &str) -> Result<ParsedMedications, StructuringError> {
            Err(StructuringError::UpstreamContent("garbage".into()))
        }
    }

    const AI_RESPONSE: &str = r#"{"detectedLanguage":"English","medications":[{"name":"Ibuprofen","dosage":"200 mg","frequency":"three times daily","route":"oral","confidence":0.9,"rawLine":"Ibuprofen 200 mg tid"}]}"#;

    #[test]
    fn unconfigured_ai_falls_back_to_rules() {
        let h = harness("Ibuprofen 200 mg tid", AiMedicationParser::new(None));
        let record = h.orchestrator.ingest("PT-1", upload("image/png")).unwrap();

        assert_eq!(record.parsed_by, ParsedBy::RuleBased);
        assert_eq!(record.detected_language, UNKNOWN_LANGUAGE);
        assert_eq!(record.medications.len(), 1);
        assert_eq!(record.medications[0].name, "Ibuprofen");
        assert_eq!(record.medications[0].dosage, "200 mg");
    }

    #[test]
    fn any_parser_error_is_recovered() {
        let h = harness_with(
            MockAnalysisTransport::succeeding("Paracetamol 500mg twice daily"),
            Arc::new(FailingParser),
            Arc::new(RuleBasedExtractor),
        );
        let record = h.orchestrator.ingest("PT-1", upload("image/jpeg")).unwrap();
        assert_eq!(record.parsed_by, ParsedBy::RuleBased);
        assert_eq!(record.medications[0].name, "Paracetamol");
    }

    #[test]
    fn upstream_ai_error_is_recovered() {
        let parser = AiMedicationParser::new(Some(Box::new(MockLlmClient::failing(503, "down"))));
        let h = harness("Ibuprofen 200 mg tid", parser);
        let record = h.orchestrator.ingest("PT-1", upload("image/png")).unwrap();
        assert_eq!(record.parsed_by, ParsedBy::RuleBased);
    }

    #[test]
    fn ai_result_is_used_without_fallback() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let parser = AiMedicationParser::new(Some(Box::new(MockLlmClient::new(AI_RESPONSE))));
        let h = harness_with(
            MockAnalysisTransport::succeeding("Ibuprofen 200 mg tid"),
            Arc::new(parser),
            Arc::new(CountingFallback(Arc::clone(&fallback_calls))),
        );

        let record = h.orchestrator.ingest("PT-1", upload("image/png")).unwrap();
        assert_eq!(record.parsed_by, ParsedBy::Ai);
        assert_eq!(record.detected_language, "English");
        assert_eq!(record.medications[0].route, "oral");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_ai_result_falls_back_but_keeps_language() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let parser = AiMedicationParser::new(Some(Box::new(MockLlmClient::new(
            r#"{"detectedLanguage":"German","medications":[]}"#,
        ))));
        let h = harness_with(
            MockAnalysisTransport::succeeding("Ibuprofen 200 mg tid"),
            Arc::new(parser),
            Arc::new(CountingFallback(Arc::clone(&fallback_calls))),
        );

        let record = h.orchestrator.ingest("PT-1", upload("image/png")).unwrap();
        assert_eq!(record.parsed_by, ParsedBy::RuleBased);
        assert_eq!(record.detected_language, "German");
        assert_eq!(record.medications.len(), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_type_fails_before_ocr() {
        let h = harness("anything", AiMedicationParser::new(None));
        let err = h.orchestrator.ingest("PT-1", upload("application/zip")).unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedMediaType(m) if m == "application/zip"));
        assert_eq!(h.ocr_submits.load(Ordering::SeqCst), 0);
        assert!(h.store.list("PT-1").unwrap().is_empty());
    }

    #[test]
    fn failed_analysis_persists_nothing() {
        let h = harness_with(
            MockAnalysisTransport::new(vec![AnalysisStatus::Failed {
                message: "corrupt".into(),
            }]),
            Arc::new(AiMedicationParser::new(None)),
            Arc::new(RuleBasedExtractor),
        );
        let err = h.orchestrator.ingest("PT-1", upload("image/png")).unwrap_err();

        assert!(matches!(err, IngestError::Ocr(OcrError::UpstreamAnalysis(_))));
        assert!(h.store.list("PT-1").unwrap().is_empty());
    }

    #[test]
    fn ocr_timeout_propagates() {
        let h = harness_with(
            MockAnalysisTransport::new(vec![]),
            Arc::new(AiMedicationParser::new(None)),
            Arc::new(RuleBasedExtractor),
        );
        let err = h.orchestrator.ingest("PT-1", upload("application/pdf")).unwrap_err();
        assert!(matches!(err, IngestError::Ocr(OcrError::Timeout { attempts: 20 })));
    }

    #[test]
    fn appended_record_round_trips_with_truncated_text() {
        let long_text = format!("Metformin 500 mg bd\n{}", "x".repeat(15_000));
        let h = harness(&long_text, AiMedicationParser::new(None));

        let record = h.orchestrator.ingest("PT-7", upload("image/tiff")).unwrap();
        assert_eq!(record.extracted_text.chars().count(), MAX_STORED_TEXT_CHARS);

        let stored = h.store.list("PT-7").unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn mime_normalization() {
        assert_eq!(normalize_mime_type("IMAGE/PNG"), Some("image/png"));
        assert_eq!(normalize_mime_type("image/jpg"), Some("image/jpeg"));
        assert_eq!(normalize_mime_type("application/pdf; name=x"), Some("application/pdf"));
        assert_eq!(normalize_mime_type("image/bmp"), Some("image/bmp"));
        assert_eq!(normalize_mime_type("image/gif"), None);
        assert_eq!(normalize_mime_type(""), None);
    }

    #[test]
    fn record_keeps_uploader_mime_type() {
        let h = harness("Aspirin 81 mg daily", AiMedicationParser::new(None));
        let record = h.orchestrator.ingest("PT-1", upload("image/jpg")).unwrap();
        assert_eq!(record.source_mime_type, "image/jpg");
        assert_eq!(record.source_file_name, "scan.png");
    }
}
