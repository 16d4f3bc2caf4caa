use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, decompression::RequestDecompressionLayer};
use tracing::info;

use super::{
    services::{
        cancel_download, download_cover, download_file, download_primary, download_progress,
        fetch_metadata, health, start_download,
    },
    state::AppState,
};
use crate::config::Config;
use crate::extractor::{Extractor, YtDlpExtractor};
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::retention::RetentionSweeper;
use crate::storage::FileStore;
use crate::worker::http::{CoverClient, HttpConfig};
use crate::worker::{AudioSettings, JobRunner, WorkerContext};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Wire the shared components for `config` around `extractor`
pub fn build_state(config: Config, extractor: Arc<dyn Extractor>) -> Result<AppState, AnyError> {
    let files = FileStore::open(&config.storage.download_dir, config.extractor.audio_format.clone())
        .map_err(|e| format!("Failed to open download directory: {e}"))?;
    let covers = CoverClient::new(HttpConfig::from(&config.cover))
        .map_err(|e| format!("Failed to build cover client: {e}"))?;

    let ctx = WorkerContext {
        registry: Arc::new(JobRegistry::new()),
        extractor,
        files: Arc::new(files),
        covers: Arc::new(covers),
        metrics: Arc::new(Metrics::new()),
        audio: AudioSettings {
            format: config.extractor.audio_format.clone(),
            quality: config.extractor.audio_quality.clone(),
        },
    };

    Ok(AppState::new(config, JobRunner::new(ctx)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download", post(fetch_metadata))
        .route("/start_download", post(start_download))
        .route("/download_progress/{track_id}", get(download_progress))
        .route("/download/{track_id}", delete(cancel_download))
        .route("/download_mp3/{track_id}", get(download_primary))
        .route("/download_cover/{track_id}", get(download_cover))
        .route("/download_file/{filename}", get(download_file))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
}

fn sweeper_for(state: &AppState) -> RetentionSweeper {
    RetentionSweeper::new(
        state.files().clone(),
        state.registry().clone(),
        state.metrics().clone(),
        &state.config.retention,
    )
}

pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let extractor = Arc::new(YtDlpExtractor::from_config(&config.extractor));
    let state = build_state(config, extractor)?;

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweeper_for(&state).run(shutdown.clone()));

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "audiobox listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweeper.await?;

    Ok(())
}

/// One retention pass over the configured download directory
pub async fn sweep(config: Config) -> Result<(), AnyError> {
    let extractor = Arc::new(YtDlpExtractor::from_config(&config.extractor));
    let state = build_state(config, extractor)?;

    let stats = sweeper_for(&state).sweep_once(chrono::Utc::now()).await;
    info!(deleted = stats.files_deleted, errors = stats.errors, "Sweep finished");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
