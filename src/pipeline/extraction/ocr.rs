use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use super::types::{AnalysisStatus, AnalysisTransport, PollDelay, TextRecognizer, ThreadSleep};
use super::OcrError;
use crate::config::OcrConfig;

/// Header carrying the subscription key on every call.
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Header pointing at the asynchronous analysis operation.
const OPERATION_LOCATION_HEADER: &str = "operation-location";

// ═══════════════════════════════════════════════════════════
// Polling client
// ═══════════════════════════════════════════════════════════

/// Submits a document for remote analysis and polls until the operation
/// reaches a terminal state. Stateless across calls.
pub struct DocumentAnalysisClient {
    transport: Option<Box<dyn AnalysisTransport + Send + Sync>>,
    delay: Box<dyn PollDelay + Send + Sync>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl DocumentAnalysisClient {
    /// Build from configuration. Missing endpoint or key is not an error
    /// here; it surfaces as `ServiceUnavailable` when text is requested.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let transport = HttpAnalysisTransport::from_config(config)?
            .map(|t| Box::new(t) as Box<dyn AnalysisTransport + Send + Sync>);
        if transport.is_none() {
            tracing::warn!("OCR endpoint or API key missing; uploads will be rejected");
        }
        Ok(Self {
            transport,
            delay: Box::new(ThreadSleep),
            poll_interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
        })
    }

    pub fn with_transport(
        transport: Box<dyn AnalysisTransport + Send + Sync>,
        delay: Box<dyn PollDelay + Send + Sync>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport: Some(transport),
            delay,
            poll_interval,
            max_attempts,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }
}

impl TextRecognizer for DocumentAnalysisClient {
    fn extract_text(&self, file_bytes: &[u8], mime_type: &str) -> Result<String, OcrError> {
        let transport = self.transport.as_deref().ok_or_else(|| {
            OcrError::ServiceUnavailable("OCR endpoint and API key must be configured".into())
        })?;

        let operation = transport.submit(file_bytes, mime_type)?;
        tracing::debug!(bytes = file_bytes.len(), mime_type, "OCR analysis submitted");

        for attempt in 1..=self.max_attempts {
            self.delay.wait(self.poll_interval);
            match transport.poll(&operation)? {
                AnalysisStatus::Running => {
                    tracing::trace!(attempt, "OCR analysis still running");
                }
                AnalysisStatus::Succeeded { content } => {
                    tracing::debug!(attempt, chars = content.chars().count(), "OCR analysis succeeded");
                    return Ok(content);
                }
                AnalysisStatus::Failed { message } => {
                    return Err(OcrError::UpstreamAnalysis(message));
                }
            }
        }

        // The remote job may keep running; there is no cancel call.
        Err(OcrError::Timeout {
            attempts: self.max_attempts,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// HTTP transport
// ═══════════════════════════════════════════════════════════

/// Blocking HTTP transport for a document-analysis REST service.
pub struct HttpAnalysisTransport {
    client: reqwest::blocking::Client,
    analyze_url: String,
    api_key: String,
}

impl HttpAnalysisTransport {
    /// `Ok(None)` when the endpoint or key is not configured.
    pub fn from_config(config: &OcrConfig) -> Result<Option<Self>, OcrError> {
        let (endpoint, api_key) = match (&config.endpoint, &config.api_key) {
            (Some(endpoint), Some(key)) => (endpoint, key),
            _ => return Ok(None),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrError::HttpClient(e.to_string()))?;

        Ok(Some(Self {
            client,
            analyze_url: analyze_url(endpoint, &config.model_id, &config.api_version),
            api_key: api_key.clone(),
        }))
    }
}

/// `{endpoint}/formrecognizer/documentModels/{model}:analyze?api-version={version}`
fn analyze_url(endpoint: &str, model_id: &str, api_version: &str) -> String {
    format!(
        "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
        endpoint.trim_end_matches('/'),
        model_id,
        api_version
    )
}

impl AnalysisTransport for HttpAnalysisTransport {
    fn submit(&self, file_bytes: &[u8], mime_type: &str) -> Result<String, OcrError> {
        let response = self
            .client
            .post(&self.analyze_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(file_bytes.to_vec())
            .send()
            .map_err(|e| OcrError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OcrError::UpstreamSubmission {
                status: status.as_u16(),
                body,
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                OcrError::UpstreamProtocol("Submission accepted without an operation location".into())
            })
    }

    fn poll(&self, operation_location: &str) -> Result<AnalysisStatus, OcrError> {
        let response = self
            .client
            .get(operation_location)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .map_err(|e| OcrError::HttpClient(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| OcrError::HttpClient(e.to_string()))?;
        if !status.is_success() {
            return Err(OcrError::UpstreamAnalysis(format!(
                "poll returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        interpret_operation(&body)
    }
}

/// Body of a GET on the operation location.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OperationError {
    code: Option<String>,
    message: Option<String>,
}

/// Map an operation body to a poll outcome.
fn interpret_operation(body: &str) -> Result<AnalysisStatus, OcrError> {
    let operation: AnalyzeOperation = serde_json::from_str(body)
        .map_err(|e| OcrError::UpstreamProtocol(format!("Unreadable operation status: {e}")))?;

    match operation.status.to_ascii_lowercase().as_str() {
        "succeeded" => Ok(AnalysisStatus::Succeeded {
            content: operation
                .analyze_result
                .map(|r| r.content)
                .unwrap_or_default(),
        }),
        "failed" => {
            let message = operation
                .error
                .and_then(|e| match (e.code, e.message) {
                    (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                    (None, Some(message)) => Some(message),
                    (Some(code), None) => Some(code),
                    (None, None) => None,
                })
                .unwrap_or_else(|| "Document analysis failed".to_string());
            Ok(AnalysisStatus::Failed { message })
        }
        _ => Ok(AnalysisStatus::Running),
    }
}

// ═══════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════

/// Mock transport for testing: replays a scripted sequence of poll results
/// and counts calls.
pub struct MockAnalysisTransport {
    script: Mutex<VecDeque<AnalysisStatus>>,
    /// Reported once the script is exhausted.
    after_script: AnalysisStatus,
    submit_error: Option<(u16, String)>,
    submits: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
}

impl MockAnalysisTransport {
    pub fn new(script: Vec<AnalysisStatus>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            after_script: AnalysisStatus::Running,
            submit_error: None,
            submits: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Succeeds on the first poll of every operation with the given text.
    pub fn succeeding(content: &str) -> Self {
        let mut mock = Self::new(vec![]);
        mock.after_script = AnalysisStatus::Succeeded {
            content: content.to_string(),
        };
        mock
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        let mut mock = Self::new(vec![]);
        mock.submit_error = Some((status, body.to_string()));
        mock
    }

    pub fn submit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.submits)
    }

    pub fn poll_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }
}

impl AnalysisTransport for MockAnalysisTransport {
    fn submit(&self, _file_bytes: &[u8], _mime_type: &str) -> Result<String, OcrError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match &self.submit_error {
            Some((status, body)) => Err(OcrError::UpstreamSubmission {
                status: *status,
                body: body.clone(),
            }),
            None => Ok("mock://operations/1".into()),
        }
    }

    fn poll(&self, _operation_location: &str) -> Result<AnalysisStatus, OcrError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut script = self
            .script
            .lock()
            .map_err(|_| OcrError::UpstreamProtocol("mock script poisoned".into()))?;
        Ok(script
            .pop_front()
            .unwrap_or_else(|| self.after_script.clone()))
    }
}
