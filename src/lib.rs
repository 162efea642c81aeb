pub mod api;
pub mod config;
pub mod core_state; // Transport-agnostic service state
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

/// Start the service: logging, configuration, storage, then the HTTP server
/// until Ctrl-C.
pub async fn run() -> Result<(), CoreError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    tracing::info!(
        bind_addr = config.server.bind_addr.as_str(),
        port = config.server.port,
        database = config.server.database_path.as_str(),
        ocr_configured = config.ocr.endpoint.is_some() && config.ocr.api_key.is_some(),
        ai_configured = config.ai.api_key.is_some(),
        "Configuration loaded"
    );

    // Blocking HTTP clients must be built off the async worker threads.
    let startup_config = config.clone();
    let core = tokio::task::spawn_blocking(move || CoreState::from_config(&startup_config))
        .await
        .map_err(|e| CoreError::Startup(e.to_string()))??;

    api::serve(Arc::new(core), &config.server)
        .await
        .map_err(CoreError::Server)
}
