// Two directions of sanitization around the LLM call:
// - input: strip invisible characters and injection-looking lines from OCR text
// - output: coerce, bound and filter the model's medication items

use serde_json::{Map, Value};

use crate::models::MedicationEntry;

/// Maximum medication items kept from one completion.
pub const MAX_MEDICATION_ITEMS: usize = 40;

/// Per-field character bounds for AI-produced entries.
pub const NAME_MAX: usize = 120;
pub const DOSAGE_MAX: usize = 60;
pub const FREQUENCY_MAX: usize = 80;
pub const ROUTE_MAX: usize = 60;
pub const DURATION_MAX: usize = 120;
pub const INDICATION_MAX: usize = 160;
pub const INSTRUCTIONS_MAX: usize = 220;
pub const RAW_LINE_MAX: usize = 220;
pub const LANGUAGE_MAX: usize = 40;

// ═══════════════════════════════════════════════════════════
// Output sanitization
// ═══════════════════════════════════════════════════════════

/// Turn the model's `medications` value into bounded entries.
///
/// Non-array input yields nothing. At most `MAX_MEDICATION_ITEMS` items are
/// considered; items that are not objects or carry no semantic field are dropped.
pub fn sanitize_medication_items(items: Option<&Value>) -> Vec<MedicationEntry> {
    let Some(Value::Array(items)) = items else {
        return Vec::new();
    };

    items
        .iter()
        .take(MAX_MEDICATION_ITEMS)
        .filter_map(Value::as_object)
        .map(sanitize_item)
        .filter(MedicationEntry::has_content)
        .collect()
}

fn sanitize_item(item: &Map<String, Value>) -> MedicationEntry {
    let field = |key: &str, max: usize| bounded_text(item.get(key), max);

    MedicationEntry {
        name: field("name", NAME_MAX),
        dosage: field("dosage", DOSAGE_MAX),
        frequency: field("frequency", FREQUENCY_MAX),
        route: field("route", ROUTE_MAX),
        duration: field("duration", DURATION_MAX),
        indication: field("indication", INDICATION_MAX),
        instructions: field("instructions", INSTRUCTIONS_MAX),
        confidence: clamp_confidence(item.get("confidence")),
        raw_line: field("rawLine", RAW_LINE_MAX),
    }
}

/// Coerce a JSON value to trimmed text truncated to `max` characters.
/// Null, arrays and objects become empty.
pub fn bounded_text(value: Option<&Value>, max: usize) -> String {
    let text = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    truncate_chars(&text, max)
}

/// Numeric (or numeric-string) confidence clamped into [0, 1].
fn clamp_confidence(value: Option<&Value>) -> Option<f64> {
    let raw = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.clamp(0.0, 1.0))
}

/// Truncate to at most `max` characters (not bytes), trimming a trailing
/// space left by the cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════
// Input sanitization
// ═══════════════════════════════════════════════════════════

/// Clean OCR text before it is embedded in a prompt.
/// Returns the cleaned text and how many lines were dropped.
pub fn clean_for_prompt(raw: &str) -> (String, usize) {
    let visible: String = raw.chars().filter(|c| !is_invisible(*c)).collect();

    let mut dropped = 0usize;
    let kept: Vec<&str> = visible
        .lines()
        .filter(|line| {
            let lowered = line.trim().to_lowercase();
            let injected = looks_like_injection(&lowered);
            if injected {
                dropped += 1;
            }
            !injected
        })
        .collect();

    (kept.join("\n").trim().to_string(), dropped)
}

fn is_invisible(c: char) -> bool {
    if matches!(c, '\n' | '\t' | ' ') {
        return false;
    }
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    ) || c.is_control()
}

const ROLE_MARKERS: &[&str] = &[
    "system:",
    "assistant:",
    "user:",
    "[system]",
    "[inst]",
    "[/inst]",
    "<<sys>>",
    "<system",
    "</system",
    "</document",
];

const OVERRIDE_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "ignore all instructions",
    "ignore the above",
    "disregard your instructions",
    "disregard all instructions",
    "forget your instructions",
    "new instructions:",
];

fn looks_like_injection(lowered: &str) -> bool {
    ROLE_MARKERS.iter().any(|m| lowered.starts_with(m))
        || OVERRIDE_PHRASES.iter().any(|p| lowered.contains(p))
}
