//! HTTP handlers: health and action ingress.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::debug;

use loom_core::Action;

use crate::AppState;
use crate::error::ServerError;

/// Response for the health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    pub active_sessions: usize,
}

/// GET /api/health - health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions: state.session_count().await,
    })
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ServerError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// POST /api/sessions/:session_id/actions - enqueue an action onto a
/// session's Processor, creating the Processor on first touch (spec §2
/// "Control flow").
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(action): Json<Action>,
) -> Result<StatusCode, ServerError> {
    debug!(session_id = %session_id, "enqueueing action");
    let processor = state.registry.get_or_create(&session_id).await;
    processor
        .queue
        .offer(action)
        .map_err(|_| ServerError::Internal("processor is no longer accepting actions".into()))?;
    state.registry.touch(&session_id).await;
    Ok(StatusCode::ACCEPTED)
}
