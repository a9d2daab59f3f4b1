//! HTTP endpoints for operational tooling

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::types::QuestionId;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the event bridge is subscribed to the chat feed
    pub bridge_attached: bool,
    pub current_question_id: Option<QuestionId>,
    pub overlay_clients: usize,
    pub server_now: String,
}

/// GET /healthz
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let bridge_attached = state.is_attached().await;
    Json(HealthResponse {
        status: if bridge_attached { "ok" } else { "detached" },
        bridge_attached,
        current_question_id: state.current_question().await,
        overlay_clients: state.overlay.receiver_count(),
        server_now: chrono::Utc::now().to_rfc3339(),
    })
}
