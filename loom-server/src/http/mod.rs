//! HTTP server module

mod api;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;
use crate::ws::subscribe_ws;

pub use api::HealthResponse;

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/sessions/:session_id/actions", post(api::submit_action))
        .route("/api/sessions/:session_id/subscribe", get(subscribe_ws))
        .with_state(state)
}
