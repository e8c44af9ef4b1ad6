//! HTTP server.
//!
//! - [`api`]: Request/response types and route handlers
//! - [`error`]: Error type and status mapping
//! - [`metrics`]: Prometheus registry

pub mod api;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::inference::engine::{InferenceEngine, ModelHandle};
use crate::server::metrics::Metrics;

/// Application state shared across handlers.
pub struct AppState {
    pub engine: InferenceEngine,
    pub config: Arc<Config>,
    pub metrics: Metrics,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, model: ModelHandle) -> anyhow::Result<Self> {
        Ok(Self {
            engine: InferenceEngine::new(model, &config.server),
            config,
            metrics: Metrics::new()?,
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.frontend.dir);

    Router::new()
        .route("/", get(api::index))
        .route("/api/health", get(api::health))
        .route("/api/simple_interaction", post(api::simple_interaction))
        .route("/api/complex_interaction", post(api::complex_interaction))
        .route("/api/sample_queries", get(api::sample_queries))
        .route("/metrics", get(api::metrics))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
