use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use mask_relay::{router, AppState, Config, MaskStore, OnnxModel};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    config.validate()?;

    let model = OnnxModel::new(&config.model_path, config.variant, config.device_id)
        .with_context(|| format!("Failed to load model: {}", config.model_path.display()))?;
    let store = MaskStore::open(&config.masks_dir)?;
    let state = AppState::new(Arc::new(model), store, AppState::signing_key(&config));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        masks_dir = %config.masks_dir.display(),
        variant = ?config.variant,
        "listening"
    );

    axum::serve(listener, router(state, config.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
}
