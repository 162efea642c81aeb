//! Medication history endpoints.
//!
//! `POST /api/patients/:patient_id/medication-history`: multipart upload
//! (field `document`), runs the ingestion pipeline and returns the new record.
//! `GET /api/patients/:patient_id/medication-history`: the patient's records
//! in upload order.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::MedicalHistoryRecord;
use crate::pipeline::ingest::UploadedDocument;

/// Multipart field carrying the uploaded file.
pub const DOCUMENT_FIELD: &str = "document";

const FALLBACK_FILE_NAME: &str = "document";
const OCTET_STREAM: &str = "application/octet-stream";

/// Upload read off the wire, owned so it can move to a blocking thread.
struct ReceivedDocument {
    file_name: String,
    mime_type: String,
    bytes: Bytes,
}

/// `POST /api/patients/:patient_id/medication-history`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<MedicalHistoryRecord>), ApiError> {
    let patient_id = validated_patient_id(patient_id)?;
    let mut multipart =
        multipart.map_err(|e| ApiError::BadRequest(format!("Expected multipart form data: {e}")))?;

    let received = read_document(&mut multipart).await?;
    if received.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded document is empty".into()));
    }
    tracing::debug!(
        patient_id = patient_id.as_str(),
        file_name = received.file_name.as_str(),
        mime_type = received.mime_type.as_str(),
        bytes = received.bytes.len(),
        "Upload received"
    );

    let core = Arc::clone(&ctx.core);
    let budget = core.ingest_timeout;
    let task = tokio::task::spawn_blocking(move || {
        core.orchestrator.ingest(
            &patient_id,
            UploadedDocument {
                file_name: &received.file_name,
                mime_type: &received.mime_type,
                bytes: &received.bytes,
            },
        )
    });

    let record = tokio::time::timeout(budget, task)
        .await
        .map_err(|_| ApiError::Timeout(format!("ingestion exceeded {}s", budget.as_secs())))?
        .map_err(|e| ApiError::Internal(format!("Ingestion task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/patients/:patient_id/medication-history`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<MedicalHistoryRecord>>, ApiError> {
    let patient_id = validated_patient_id(patient_id)?;
    let records = ctx.core.store.list(&patient_id)?;
    Ok(Json(records))
}

fn validated_patient_id(patient_id: String) -> Result<String, ApiError> {
    let trimmed = patient_id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Patient id is required".into()));
    }
    Ok(trimmed.to_string())
}

/// Find the `document` field; other fields are skipped.
async fn read_document(multipart: &mut Multipart) -> Result<ReceivedDocument, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let mime_type = resolve_mime_type(field.content_type(), &file_name);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(ReceivedDocument {
            file_name,
            mime_type,
            bytes,
        });
    }

    Err(ApiError::BadRequest(format!(
        "Missing file field '{DOCUMENT_FIELD}'"
    )))
}

/// Declared part type, or a guess from the file name when the client sent
/// none (or only the generic octet-stream).
fn resolve_mime_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && !mime.eq_ignore_ascii_case(OCTET_STREAM) => {
            mime.to_string()
        }
        _ => mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string(),
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}
