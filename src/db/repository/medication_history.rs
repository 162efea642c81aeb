use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{MedicalHistoryRecord, MedicationEntry, ParsedBy};

/// Append one history record for a patient. A single INSERT: concurrent
/// appends for the same patient never overwrite each other.
pub fn append_history_record(
    conn: &Connection,
    patient_id: &str,
    record: &MedicalHistoryRecord,
) -> Result<(), DatabaseError> {
    let medications_json = serde_json::to_string(&record.medications)?;
    conn.execute(
        "INSERT INTO medication_history (id, patient_id, source_file_name, source_mime_type,
         extracted_text, medications_json, detected_language, parsed_by, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id.to_string(),
            patient_id,
            record.source_file_name,
            record.source_mime_type,
            record.extracted_text,
            medications_json,
            record.detected_language,
            record.parsed_by.as_str(),
            record.uploaded_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All history records for a patient, in upload order.
pub fn get_history_records(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<MedicalHistoryRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, source_file_name, source_mime_type, extracted_text, medications_json,
         detected_language, parsed_by, uploaded_at
         FROM medication_history WHERE patient_id = ?1 ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![patient_id], |row| {
        Ok(HistoryRow {
            id: row.get(0)?,
            source_file_name: row.get(1)?,
            source_mime_type: row.get(2)?,
            extracted_text: row.get(3)?,
            medications_json: row.get(4)?,
            detected_language: row.get(5)?,
            parsed_by: row.get(6)?,
            uploaded_at: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(history_from_row(row?)?);
    }
    Ok(records)
}

struct HistoryRow {
    id: String,
    source_file_name: String,
    source_mime_type: String,
    extracted_text: String,
    medications_json: String,
    detected_language: String,
    parsed_by: String,
    uploaded_at: String,
}

fn history_from_row(row: HistoryRow) -> Result<MedicalHistoryRecord, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidValue {
        field: "id".into(),
        value: row.id.clone(),
    })?;
    let parsed_by =
        ParsedBy::from_str(&row.parsed_by).map_err(|_| DatabaseError::InvalidValue {
            field: "parsed_by".into(),
            value: row.parsed_by.clone(),
        })?;
    let uploaded_at = DateTime::parse_from_rfc3339(&row.uploaded_at)
        .map_err(|_| DatabaseError::InvalidValue {
            field: "uploaded_at".into(),
            value: row.uploaded_at.clone(),
        })?
        .with_timezone(&Utc);
    let medications: Vec<MedicationEntry> = serde_json::from_str(&row.medications_json)?;

    Ok(MedicalHistoryRecord {
        id,
        source_file_name: row.source_file_name,
        source_mime_type: row.source_mime_type,
        extracted_text: row.extracted_text,
        medications,
        detected_language: row.detected_language,
        parsed_by,
        uploaded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn record(file: &str, parsed_by: ParsedBy) -> MedicalHistoryRecord {
        MedicalHistoryRecord {
            id: Uuid::new_v4(),
            source_file_name: file.into(),
            source_mime_type: "image/png".into(),
            extracted_text: "Amoxicillin 500 mg tid".into(),
            medications: vec![MedicationEntry {
                name: "Amoxicillin".into(),
                dosage: "500 mg".into(),
                frequency: "tid".into(),
                confidence: Some(0.5),
                raw_line: "Amoxicillin 500 mg tid".into(),
                ..Default::default()
            }],
            detected_language: "en".into(),
            parsed_by,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn append_then_read_back_same_shape() {
        let conn = open_memory_database().unwrap();
        let rec = record("a.png", ParsedBy::Ai);
        append_history_record(&conn, "PT-1", &rec).unwrap();

        let stored = get_history_records(&conn, "PT-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, rec.id);
        assert_eq!(stored[0].medications, rec.medications);
        assert_eq!(stored[0].parsed_by, ParsedBy::Ai);
        assert_eq!(stored[0].uploaded_at.timestamp(), rec.uploaded_at.timestamp());
    }

    #[test]
    fn records_are_ordered_and_scoped_per_patient() {
        let conn = open_memory_database().unwrap();
        append_history_record(&conn, "PT-1", &record("first.png", ParsedBy::Ai)).unwrap();
        append_history_record(&conn, "PT-2", &record("other.png", ParsedBy::Ai)).unwrap();
        append_history_record(&conn, "PT-1", &record("second.png", ParsedBy::RuleBased)).unwrap();

        let names: Vec<String> = get_history_records(&conn, "PT-1")
            .unwrap()
            .into_iter()
            .map(|r| r.source_file_name)
            .collect();
        assert_eq!(names, vec!["first.png", "second.png"]);
    }

    #[test]
    fn unknown_patient_has_empty_history() {
        let conn = open_memory_database().unwrap();
        assert!(get_history_records(&conn, "PT-missing").unwrap().is_empty());
    }

    #[test]
    fn duplicate_record_id_is_rejected() {
        let conn = open_memory_database().unwrap();
        let rec = record("a.png", ParsedBy::Ai);
        append_history_record(&conn, "PT-1", &rec).unwrap();
        assert!(append_history_record(&conn, "PT-1", &rec).is_err());
        assert_eq!(get_history_records(&conn, "PT-1").unwrap().len(), 1);
    }
}
