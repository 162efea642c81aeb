//! API server lifecycle: bind → spawn background task → return a handle
//! with a shutdown channel. `serve` drives the full lifecycle and stops
//! gracefully on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::config::ServerConfig;
use crate::core_state::CoreState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    pub started_at: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Signal graceful shutdown. In-flight requests are allowed to finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to exit.
    pub async fn stopped(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

/// Bind the configured address and spawn the server in a background task.
pub async fn start_api_server(
    core: Arc<CoreState>,
    config: &ServerConfig,
) -> Result<ApiServer, String> {
    // 1. Bind
    let listener = tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.port))
        .await
        .map_err(|e| format!("Failed to bind {}:{}: {e}", config.bind_addr, config.port))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    // 2. Router
    let app = api_router(core, &config.client_origins);

    // 3. Shutdown channel
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // 4. Spawn
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        started_at: chrono::Utc::now().to_rfc3339(),
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Run the server until Ctrl-C, then shut down gracefully.
pub async fn serve(core: Arc<CoreState>, config: &ServerConfig) -> Result<(), String> {
    let mut server = start_api_server(core, config).await?;
    ctrl_c().await;
    server.shutdown();
    server.stopped().await;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until the process is killed.
        tracing::error!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::{HistoryStore, SqliteHistoryStore};
    use crate::pipeline::extraction::{DocumentAnalysisClient, MockAnalysisTransport, NoDelay};
    use crate::pipeline::ingest::IngestionOrchestrator;
    use crate::pipeline::structuring::{AiMedicationParser, RuleBasedExtractor};

    fn test_core() -> Arc<CoreState> {
        let store: Arc<dyn HistoryStore + Send + Sync> =
            Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let recognizer = DocumentAnalysisClient::with_transport(
            Box::new(MockAnalysisTransport::succeeding("Aspirin 81 mg daily")),
            Box::new(NoDelay),
            Duration::from_millis(1200),
            20,
        );
        let orchestrator = IngestionOrchestrator::new(
            Arc::new(recognizer),
            Arc::new(AiMedicationParser::new(None)),
            Arc::new(RuleBasedExtractor),
            Arc::clone(&store),
        );
        Arc::new(CoreState::new(orchestrator, store, Duration::from_secs(60)))
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let mut server = start_api_server(test_core(), &local_config())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);
        assert!(!server.started_at.is_empty());

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let url = format!("http://{}/nonexistent", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), server.stopped())
            .await
            .expect("server should stop");
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = start_api_server(test_core(), &local_config()).await.unwrap();
        let taken = ServerConfig {
            port: first.addr.port(),
            ..local_config()
        };
        match start_api_server(test_core(), &taken).await {
            Err(e) => assert!(e.contains("Failed to bind"), "unexpected error: {e}"),
            Ok(_) => panic!("second bind on the same port should fail"),
        }
    }
}
