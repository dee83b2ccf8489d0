mod auth;
mod config;
mod engine;
mod error;
mod routes;
mod state;
mod storage;
mod util;
mod validate;

use anyhow::{Context, Result};
use config::Config;
use state::AppState;
use std::sync::Arc;
use storage::UploadStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        data_dir = %config.data_dir.display(),
        threshold = config.similarity_threshold,
        auto_train = config.auto_train,
        "likenessd starting"
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .context("creating data directory")?;

    let uploads = UploadStore::new(
        config.uploads_dir(),
        config.max_upload_bytes,
        config.allowed_extensions.clone(),
    );
    uploads
        .ensure_layout()
        .await
        .context("creating upload directories")?;

    let store = likeness_store::Store::open(&config.db_path)
        .await
        .context("opening database")?;

    let engine = engine::spawn_engine(
        config.detector_model_path(),
        config.recognizer_model_path(),
        config.detection_threshold,
    )
    .context("loading face models")?;

    let addr = format!("{}:{}", config.bind_host, config.bind_port);
    let state = AppState {
        config: Arc::new(config),
        store,
        engine,
        uploads,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "likenessd listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("likenessd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
