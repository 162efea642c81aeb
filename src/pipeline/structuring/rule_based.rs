//! Rule-based medication extraction.
//!
//! A conservative baseline used when the AI parser is unavailable or finds
//! nothing. Pure and total: no I/O, no errors, and every entry traces back to
//! exactly one input line.

use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::{truncate_chars, NAME_MAX, RAW_LINE_MAX};
use crate::models::MedicationEntry;

/// Maximum medication-like lines considered per document.
pub const MAX_RULE_BASED_LINES: usize = 30;

/// Dosage units, dosage forms, or frequency keywords.
static MEDICATION_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?\s*(?:mg|ml|mcg|µg|g|iu|units?)\b|\b(?:tab(?:let)?s?|cap(?:sule)?s?|syrup|susp(?:ension)?|inj(?:ection)?|drops?|ointment|cream|inhaler|patch|sachet)\b|\b(?:daily|once|twice|thrice|bid|b\.i\.d|tid|t\.i\.d|qid|qhs|qd|od|bd|tds|prn|nightly|bedtime|every\s+\d+\s*(?:hours?|hrs?|h|days?))\b)",
    )
    .unwrap()
});

/// Number followed by a dosage unit, e.g. `500mg`, `2.5 ml`.
static DOSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d+(?:\.\d+)?\s?(?:mg|ml|mcg|g|iu)\b").unwrap());

/// Frequency phrase, e.g. `twice daily`, `tid`, `every 8 hours`.
static FREQUENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:once|twice|thrice|three times|four times)\s+(?:a\s+|per\s+)?(?:day|daily|week|weekly)|every\s+\d+\s*(?:hours?|hrs?|h|days?)|once|twice|daily|nightly|at bedtime|bid|b\.i\.d|tid|t\.i\.d|qid|qhs|qd|od|bd|tds|prn)\b",
    )
    .unwrap()
});

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s\-]").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Fallback extractor abstraction (allows counting invocations in tests)
pub trait FallbackExtractor {
    fn extract(&self, raw_text: &str) -> Vec<MedicationEntry>;
}

/// Pattern-matching extractor backed by `extract_medications`.
pub struct RuleBasedExtractor;

impl FallbackExtractor for RuleBasedExtractor {
    fn extract(&self, raw_text: &str) -> Vec<MedicationEntry> {
        extract_medications(raw_text)
    }
}

/// Extract medication entries from free text, one candidate per line.
pub fn extract_medications(raw_text: &str) -> Vec<MedicationEntry> {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| MEDICATION_HINT.is_match(line))
        .take(MAX_RULE_BASED_LINES)
        .filter_map(entry_from_line)
        .collect()
}

fn entry_from_line(line: &str) -> Option<MedicationEntry> {
    let dosage = DOSAGE.find(line).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    let frequency = FREQUENCY
        .find(line)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let mut name = line.to_string();
    for matched in [&dosage, &frequency] {
        if !matched.is_empty() {
            name = name.replacen(matched.as_str(), " ", 1);
        }
    }
    let name = PUNCTUATION.replace_all(&name, " ");
    let name = WHITESPACE.replace_all(&name, " ");
    let name = truncate_chars(name.trim().trim_matches('-').trim(), NAME_MAX);

    if name.is_empty() && dosage.is_empty() && frequency.is_empty() {
        return None;
    }

    Some(MedicationEntry {
        name,
        dosage,
        frequency,
        raw_line: truncate_chars(line, RAW_LINE_MAX),
        ..Default::default()
    })
}
