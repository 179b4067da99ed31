use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::{self, net::TcpListener};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use viton_core::{device_label, select_best_device};
use viton_server::{router, AppState, Args, ModelSlot};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let device = select_best_device(args.device_map())?;
    tracing::info!("Using device: {}", device_label(&device));
    tracing::info!("VITON-HD path: {}", args.model_root.display());

    let model = ModelSlot::new(args.checkpoint_dir(), args.checkpoint.clone(), device);

    // Load model on startup
    if let Err(e) = model.get_or_load().await {
        tracing::warn!("Could not preload model: {e:#}");
        tracing::warn!("Model will be loaded on first request");
    }

    let shared_state = Arc::new(AppState::new(model, args.resolution()));
    let app = router(shared_state, args.max_upload_bytes);

    // --- Start the server ---
    let listener = TcpListener::bind(args.bind_address()).await?;
    tracing::info!("Started server on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
