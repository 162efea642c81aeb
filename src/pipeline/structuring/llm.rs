use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::StructuringError;
use crate::config::AiConfig;

/// Blocking client for an OpenAI-compatible chat-completion endpoint.
pub struct ChatCompletionClient {
    client: reqwest::blocking::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
}

impl ChatCompletionClient {
    /// `Ok(None)` when no API key is configured.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, StructuringError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Some(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
        }))
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl LlmClient for ChatCompletionClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, StructuringError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    StructuringError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::UpstreamRequest {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| StructuringError::UpstreamContent(e.to_string()))?;

        completion_text(parsed)
    }
}

fn completion_text(response: ChatCompletionResponse) -> Result<String, StructuringError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| StructuringError::UpstreamContent("Completion has no message content".into()))
}

/// Mock LLM client for testing: returns a configurable response and counts calls.
pub struct MockLlmClient {
    response: Result<String, (u16, String)>,
    calls: Arc<AtomicUsize>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call fails with the given upstream status.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            response: Err((status, body.to_string())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _system: &str, _user: &str) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(StructuringError::UpstreamRequest {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
