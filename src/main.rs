//! drug-interaction-api server binary.
//!
//! Binds the HTTP listener first, then loads the model on a blocking worker
//! so `/api/health` reports `loading` until the model is ready.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use drug_interaction_api::config::{Cli, Config};
use drug_interaction_api::inference::engine::ModelHandle;
use drug_interaction_api::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "drug_interaction_api=debug,tower_http=debug"
    } else {
        "drug_interaction_api=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("drug-interaction-api v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    let config = Arc::new(config);

    info!(
        model = %config.model.model_path.display(),
        n_gpu_layers = config.model.n_gpu_layers,
        context_size = config.model.context_size,
        n_threads = config.model.n_threads,
        max_concurrent_inferences = config.server.max_concurrent_inferences,
        "Configuration loaded"
    );

    // Build application state.
    let model = ModelHandle::new();
    let state = Arc::new(AppState::new(config.clone(), model.clone())?);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    let listener = TcpListener::bind(&listen_addr).await?;
    let url = config.display_url();
    info!(addr = listen_addr, "Listening");
    info!("Drug interaction demo: {url}");
    info!("Health: {url}/api/health");

    // Load the model in the background.
    model.set_loading().await;
    let loader = model.clone();
    let model_config = config.model.clone();
    tokio::spawn(async move {
        if let Err(e) = loader.load(model_config).await {
            error!("Model unavailable, inference requests will fail: {e}");
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    model.unload().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
