use std::time::Instant;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::{error::ApiError, response::ApiResponse, session::SessionId};
use crate::{
    controller::{AppState, SaveOutcome},
    domain::{DatasetStats, Observation},
    pipeline::ModelsReport,
};

/// Result of a reload or save: what was stored and what got trained.
#[derive(Debug, Serialize)]
pub struct RetrainSummary {
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SaveOutcome>,
    pub models: ModelsReport,
}

/// GET /api/v1/data - Current dataset of the session
pub async fn get_data(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<ApiResponse<Vec<Observation>>, ApiError> {
    let ctx = state.context(&session).await?;
    let rows = ctx.observations().to_vec();
    let count = rows.len();
    Ok(ApiResponse::success(rows).with_count(count).with_session(session))
}

/// GET /api/v1/data/stats - Dataset statistics
pub async fn get_stats(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<ApiResponse<DatasetStats>, ApiError> {
    let ctx = state.context(&session).await?;
    Ok(ApiResponse::success(ctx.stats()).with_session(session))
}

/// PUT /api/v1/data - Replace the dataset, save the changes and retrain
pub async fn put_data(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(rows): Json<Vec<Observation>>,
) -> Result<ApiResponse<RetrainSummary>, ApiError> {
    let started = Instant::now();
    let (ctx, outcome) = state.save(&session, rows).await?;
    let summary = RetrainSummary {
        rows: ctx.observations().len(),
        saved: Some(outcome),
        models: ctx.models_report(),
    };
    Ok(ApiResponse::success(summary)
        .with_session(session)
        .with_duration(started.elapsed().as_millis() as u64))
}

/// POST /api/v1/data/reload - Re-read the data source and retrain
pub async fn reload(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<ApiResponse<RetrainSummary>, ApiError> {
    let started = Instant::now();
    let ctx = state.reload(&session).await?;
    let summary = RetrainSummary {
        rows: ctx.observations().len(),
        saved: None,
        models: ctx.models_report(),
    };
    Ok(ApiResponse::success(summary)
        .with_session(session)
        .with_duration(started.elapsed().as_millis() as u64))
}

/// GET /api/v1/data/export.csv - Dataset as CSV
pub async fn export_csv(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<impl IntoResponse, ApiError> {
    let body = state.export_csv(&session).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"power_data.csv\""),
        ],
        body,
    ))
}
