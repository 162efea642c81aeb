use serde::{Deserialize, Serialize};

use super::StructuringError;
use crate::models::MedicationEntry;

/// Structured result of parsing one document's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMedications {
    pub detected_language: String,
    pub medications: Vec<MedicationEntry>,
}

/// Chat-completion client abstraction (allows mocking)
pub trait LlmClient {
    /// Single completion; returns the model's text output.
    fn complete(&self, system: &str, user: &str) -> Result<String, StructuringError>;
}

/// Primary (AI) medication parser abstraction.
pub trait MedicationParsing {
    fn parse_medications(&self, raw_text: &str) -> Result<ParsedMedications, StructuringError>;
}
