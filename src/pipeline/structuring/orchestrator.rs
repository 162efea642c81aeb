use super::parser::extract_json_object;
use super::prompt::{build_medication_prompt, MEDICATION_SYSTEM_PROMPT};
use super::sanitize::{bounded_text, clean_for_prompt, sanitize_medication_items, truncate_chars, LANGUAGE_MAX};
use super::types::{LlmClient, MedicationParsing, ParsedMedications};
use super::StructuringError;

/// Maximum OCR text sent to the model (characters). Longer input is cut, not chunked.
pub const MAX_PROMPT_TEXT_CHARS: usize = 12_000;

/// Primary medication parser: one completion request per document, no retries.
/// Callers decide whether to fall back on failure.
pub struct AiMedicationParser {
    llm: Option<Box<dyn LlmClient + Send + Sync>>,
}

impl AiMedicationParser {
    pub fn new(llm: Option<Box<dyn LlmClient + Send + Sync>>) -> Self {
        Self { llm }
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }
}

impl MedicationParsing for AiMedicationParser {
    fn parse_medications(&self, raw_text: &str) -> Result<ParsedMedications, StructuringError> {
        let llm = self.llm.as_deref().ok_or_else(|| {
            StructuringError::ServiceUnavailable("AI API key is not configured".into())
        })?;

        if raw_text.trim().is_empty() {
            return Ok(ParsedMedications::default());
        }

        let (cleaned, dropped_lines) = clean_for_prompt(raw_text);
        if dropped_lines > 0 {
            tracing::warn!(
                dropped_lines,
                "Injection-like lines removed from OCR text before parsing"
            );
        }
        if cleaned.is_empty() {
            return Ok(ParsedMedications::default());
        }
        let text = truncate_chars(&cleaned, MAX_PROMPT_TEXT_CHARS);

        let completion = llm.complete(MEDICATION_SYSTEM_PROMPT, &build_medication_prompt(&text))?;
        let object = extract_json_object(&completion)?;

        let parsed = ParsedMedications {
            detected_language: bounded_text(object.get("detectedLanguage"), LANGUAGE_MAX),
            medications: sanitize_medication_items(object.get("medications")),
        };
        tracing::debug!(
            medications = parsed.medications.len(),
            "AI parser returned medications"
        );
        Ok(parsed)
    }
}
