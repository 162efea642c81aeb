/// Clinical abbreviations the model is told to recognise and expand.
pub const ACCEPTED_ABBREVIATIONS: &[(&str, &str)] = &[
    ("OD", "once daily"),
    ("QD", "once daily"),
    ("BD", "twice daily"),
    ("BID", "twice daily"),
    ("TID", "three times daily"),
    ("TDS", "three times daily"),
    ("QID", "four times daily"),
    ("QHS", "at bedtime"),
    ("HS", "at bedtime"),
    ("PRN", "as needed"),
    ("STAT", "immediately"),
    ("AC", "before meals"),
    ("PC", "after meals"),
    ("PO", "by mouth"),
    ("SL", "sublingual"),
    ("IM", "intramuscular"),
    ("IV", "intravenous"),
    ("SC", "subcutaneous"),
    ("TAB", "tablet"),
    ("CAP", "capsule"),
];

pub const MEDICATION_SYSTEM_PROMPT: &str = r#"
You extract medications from OCR text of medical documents such as prescriptions,
discharge summaries and pharmacy labels. The text may be noisy, handwritten or in
any language.

RULES:
1. Extract ONLY medications explicitly present in the text.
2. NEVER add advice, diagnosis or medications that are not written.
3. Preserve doses and frequencies as written; use an empty string for unknown fields.
4. Respond with a single JSON object and nothing else.
"#;

/// Build the user instruction embedding the document text.
pub fn build_medication_prompt(raw_text: &str) -> String {
    let abbreviations = ACCEPTED_ABBREVIATIONS
        .iter()
        .map(|(abbr, meaning)| format!("{abbr} = {meaning}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"<document>
{raw_text}
</document>

Recognise these clinical abbreviations: {abbreviations}.

Return JSON with exactly this shape:
{{
  "detectedLanguage": "language of the document, e.g. English",
  "medications": [
    {{
      "name": "",
      "dosage": "",
      "frequency": "",
      "route": "",
      "duration": "",
      "indication": "",
      "instructions": "",
      "confidence": 0.0,
      "rawLine": "the source line"
    }}
  ]
}}"#
    )
}
