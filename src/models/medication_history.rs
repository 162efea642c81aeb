use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One structured medication mention extracted from a document.
///
/// Text fields are never null: an absent value is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub route: String,
    pub duration: String,
    pub indication: String,
    pub instructions: String,
    /// Parser certainty in [0, 1]; `None` when the parser does not score entries.
    pub confidence: Option<f64>,
    /// Source fragment the entry was derived from.
    pub raw_line: String,
}

impl MedicationEntry {
    /// True when at least one semantic field carries text. `raw_line` does not count.
    pub fn has_content(&self) -> bool {
        [
            &self.name,
            &self.dosage,
            &self.frequency,
            &self.route,
            &self.duration,
            &self.indication,
            &self.instructions,
        ]
        .iter()
        .any(|field| !field.is_empty())
    }
}

/// Which extraction strategy produced a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsedBy {
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "rule-based")]
    RuleBased,
}

impl ParsedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsedBy::Ai => "ai",
            ParsedBy::RuleBased => "rule-based",
        }
    }
}

impl std::str::FromStr for ParsedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(ParsedBy::Ai),
            "rule-based" => Ok(ParsedBy::RuleBased),
            other => Err(format!("unknown parser tag: {other}")),
        }
    }
}

/// One upload event and its extraction result. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryRecord {
    pub id: Uuid,
    pub source_file_name: String,
    pub source_mime_type: String,
    pub extracted_text: String,
    pub medications: Vec<MedicationEntry>,
    pub detected_language: String,
    pub parsed_by: ParsedBy,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_line_alone_is_not_content() {
        let entry = MedicationEntry {
            raw_line: "some text".into(),
            ..Default::default()
        };
        assert!(!entry.has_content());
    }

    #[test]
    fn any_semantic_field_is_content() {
        let entry = MedicationEntry {
            instructions: "with food".into(),
            ..Default::default()
        };
        assert!(entry.has_content());
    }

    #[test]
    fn serializes_camel_case_with_parser_tag() {
        let record = MedicalHistoryRecord {
            id: Uuid::nil(),
            source_file_name: "scan.png".into(),
            source_mime_type: "image/png".into(),
            extracted_text: String::new(),
            medications: vec![MedicationEntry {
                name: "Metformin".into(),
                raw_line: "Metformin".into(),
                ..Default::default()
            }],
            detected_language: "unknown".into(),
            parsed_by: ParsedBy::RuleBased,
            uploaded_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["parsedBy"], "rule-based");
        assert_eq!(json["sourceFileName"], "scan.png");
        assert_eq!(json["medications"][0]["rawLine"], "Metformin");
        assert!(json["medications"][0]["confidence"].is_null());
    }

    #[test]
    fn parser_tag_round_trips_through_str() {
        for tag in [ParsedBy::Ai, ParsedBy::RuleBased] {
            assert_eq!(tag.as_str().parse::<ParsedBy>().unwrap(), tag);
        }
        assert!("ocr".parse::<ParsedBy>().is_err());
    }
}
