// SPDX-License-Identifier: MIT

//! HTTP facade over the workflow engine

mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::WayfarerError;
use crate::wayfarer::workflow::graph::WorkflowEngine;

pub use errors::{AppError, ErrorResponse};
pub use handlers::SnapshotView;

/// Shared by every handler
pub struct AppState {
    pub engine: WorkflowEngine,
    /// Cap applied to stream runs that do not set one
    pub max_iterations: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/stream-run", post(handlers::stream_run))
        .route("/api/plan", post(handlers::plan))
        .route("/api/research", post(handlers::research))
        .route("/api/generate", post(handlers::generate))
        .route("/api/critique", post(handlers::critique))
        .route("/api/branch", post(handlers::branch))
        .route("/api/get-state", get(handlers::get_state))
        .route("/api/get-state-history", get(handlers::get_state_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<(), WayfarerError> {
    let app = router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| WayfarerError::config(format!("invalid listen address {}:{}: {}", host, port, e)))?;
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
