//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::pipeline::extraction::OcrError;
use crate::pipeline::ingest::IngestError;

/// Error response body: `{ "message": ..., "code": ... }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Upload exceeds size limit")]
    PayloadTooLarge,
    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!(
                    "Upload exceeds the {} MiB limit",
                    crate::config::MAX_UPLOAD_BYTES / (1024 * 1024)
                ),
            ),
            ApiError::UnsupportedMediaType(mime) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                format!("Unsupported file type: {mime}. Upload a JPEG, PNG, BMP, TIFF or PDF"),
            ),
            ApiError::ServiceUnavailable(detail) => {
                tracing::error!(detail, "Required service not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVICE_UNAVAILABLE",
                    "Document processing is not configured on this server".to_string(),
                )
            }
            ApiError::Upstream(detail) => {
                tracing::error!(detail, "Upstream service error");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Document analysis service failed".to_string(),
                )
            }
            ApiError::Timeout(detail) => {
                tracing::warn!(detail, "Request timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    "Document processing timed out".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message, code })).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedMediaType(mime) => ApiError::UnsupportedMediaType(mime),
            IngestError::Ocr(OcrError::ServiceUnavailable(detail)) => {
                ApiError::ServiceUnavailable(detail)
            }
            IngestError::Ocr(e @ OcrError::Timeout { .. }) => ApiError::Timeout(e.to_string()),
            IngestError::Ocr(e) => ApiError::Upstream(e.to_string()),
            IngestError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn bad_request_keeps_detail() {
        let (status, json) = render(ApiError::BadRequest("Missing document".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
        assert_eq!(json["message"], "Missing document");
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let (status, json) = render(ApiError::Internal("disk I/O at /var/db".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn ingest_errors_map_to_statuses() {
        let cases = [
            (
                IngestError::UnsupportedMediaType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                IngestError::Ocr(OcrError::ServiceUnavailable("no key".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                IngestError::Ocr(OcrError::UpstreamSubmission {
                    status: 401,
                    body: "denied".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                IngestError::Ocr(OcrError::UpstreamProtocol("no header".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                IngestError::Ocr(OcrError::UpstreamAnalysis("failed".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                IngestError::Ocr(OcrError::HttpClient("connection refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                IngestError::Ocr(OcrError::Timeout { attempts: 20 }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                IngestError::Storage(DatabaseError::LockPoisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, _) = render(ApiError::from(err)).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn unsupported_type_names_the_mime() {
        let (_, json) = render(ApiError::UnsupportedMediaType("text/plain".into())).await;
        assert_eq!(json["code"], "UNSUPPORTED_MEDIA_TYPE");
        assert!(json["message"].as_str().unwrap().contains("text/plain"));
    }
}
