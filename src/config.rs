//! Application constants and environment-driven configuration.
//!
//! Configuration is read once at startup and handed to each component at
//! construction. Nothing below the API layer reads the environment directly.

use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "rxhub";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard cap on a single uploaded document (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "rxhub=info,tower_http=info"
}

// ═══════════════════════════════════════════════════════════
// Config structs
// ═══════════════════════════════════════════════════════════

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// CORS allow-list.
    pub client_origins: Vec<String>,
    pub database_path: String,
    /// Whole-request budget for one ingestion, independent of the OCR poll bound.
    pub ingest_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 5000,
            client_origins: vec!["http://localhost:5173".into()],
            database_path: "rxhub.db".into(),
            ingest_timeout: Duration::from_secs(60),
        }
    }
}

/// Document-analysis (OCR) service settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model_id: String,
    pub api_version: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model_id: "prebuilt-read".into(),
            api_version: "2023-07-31".into(),
            poll_interval: Duration::from_millis(1200),
            max_poll_attempts: 20,
            timeout_secs: 60,
        }
    }
}

/// Chat-completion (AI parser) settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            max_output_tokens: 1200,
            timeout_secs: 60,
        }
    }
}

/// Everything the service needs at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub ai: AiConfig,
}

impl AppConfig {
    /// Build from the process environment (after an optional `.env` load).
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut server = ServerConfig::default();
        if let Some(addr) = get("BIND_ADDR") {
            server.bind_addr = addr;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(p) => server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(origins) = get("CLIENT_ORIGIN") {
            server.client_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(path) = get("DATABASE_PATH") {
            server.database_path = path;
        }

        let mut ocr = OcrConfig {
            endpoint: get("OCR_ENDPOINT"),
            api_key: get("OCR_API_KEY"),
            ..OcrConfig::default()
        };
        if let Some(model) = get("OCR_MODEL_ID") {
            ocr.model_id = model;
        }
        if let Some(version) = get("OCR_API_VERSION") {
            ocr.api_version = version;
        }

        let mut ai = AiConfig {
            api_key: get("AI_API_KEY"),
            ..AiConfig::default()
        };
        if let Some(url) = get("AI_BASE_URL") {
            ai.base_url = url;
        }
        if let Some(model) = get("AI_MODEL") {
            ai.model = model;
        }

        Self { server, ocr, ai }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.client_origins, vec!["http://localhost:5173"]);
        assert!(config.ocr.endpoint.is_none());
        assert!(config.ai.api_key.is_none());
        assert_eq!(config.ocr.max_poll_attempts, 20);
        assert_eq!(config.ocr.poll_interval, Duration::from_millis(1200));
    }

    #[test]
    fn reads_credentials_and_origins() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("CLIENT_ORIGIN", "http://a.test, http://b.test"),
            ("OCR_ENDPOINT", "https://ocr.test"),
            ("OCR_API_KEY", "k1"),
            ("AI_API_KEY", "k2"),
            ("AI_MODEL", "small-model"),
        ]));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.client_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.ocr.endpoint.as_deref(), Some("https://ocr.test"));
        assert_eq!(config.ocr.api_key.as_deref(), Some("k1"));
        assert_eq!(config.ai.api_key.as_deref(), Some("k2"));
        assert_eq!(config.ai.model, "small-model");
    }

    #[test]
    fn blank_values_are_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[("OCR_API_KEY", "   "), ("AI_API_KEY", "")]));
        assert!(config.ocr.api_key.is_none());
        assert!(config.ai.api_key.is_none());
    }

    #[test]
    fn invalid_port_keeps_default() {
        let config = AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 5000);
    }
}
