//! HTTP surface of the tic-tac-toe agent.
//!
//! ## Endpoints
//!
//! - `POST /api/move`: decide the agent's next move
//! - `GET /health`: health check
//! - everything else: static game UI, when a directory is configured

pub mod config;
pub mod config_loader;
pub mod models;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Build the router for the given state.
pub fn build_app(state: Arc<AppState>) -> Router {
    let static_dir = state.static_dir.clone();
    let router = Router::new()
        .route("/health", get(routes::health))
        .route("/api/move", post(routes::get_move))
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
