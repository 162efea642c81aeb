//! Per-patient, append-only store of parsed-document history.
//!
//! The ingestion pipeline depends on the `HistoryStore` trait only; dashboards
//! and report generation read through the same seam.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use super::repository::medication_history::{append_history_record, get_history_records};
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::MedicalHistoryRecord;

/// Storage boundary for history records. `append` must be atomic per record
/// and must never rewrite existing records.
pub trait HistoryStore {
    fn append(&self, patient_id: &str, record: &MedicalHistoryRecord) -> Result<(), DatabaseError>;

    fn list(&self, patient_id: &str) -> Result<Vec<MedicalHistoryRecord>, DatabaseError>;
}

/// SQLite-backed history store sharing a single connection.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, patient_id: &str, record: &MedicalHistoryRecord) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        append_history_record(&conn, patient_id, record)
    }

    fn list(&self, patient_id: &str) -> Result<Vec<MedicalHistoryRecord>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        get_history_records(&conn, patient_id)
    }
}
