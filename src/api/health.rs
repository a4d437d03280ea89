use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    source: String,
    sessions: usize,
}

/// GET /api/v1/healthz - Liveness
///
/// Does not touch the data source; a session load reports source problems.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now(),
        source: state.source.describe(),
        sessions: state.session_count().await,
    };
    (StatusCode::OK, Json(response))
}
