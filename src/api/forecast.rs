use axum::{extract::State, Json};
use validator::Validate;

use super::{error::ApiError, response::ApiResponse, session::SessionId};
use crate::{
    controller::AppState,
    domain::{
        ForecastRequest, ForecastResult, GasForecastRequest, GasForecastResult,
        RecursiveForecastRequest, RecursiveForecastResult,
    },
};

/// POST /api/v1/forecast - One-day peak (and minimum) demand
pub async fn forecast(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(req): Json<ForecastRequest>,
) -> Result<ApiResponse<ForecastResult>, ApiError> {
    req.validate()?;
    let ctx = state.context(&session).await?;
    Ok(ApiResponse::success(ctx.forecast(&req)?))
}

/// POST /api/v1/forecast/recursive - Multi-day forecast fed by its own output
pub async fn forecast_recursive(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(req): Json<RecursiveForecastRequest>,
) -> Result<ApiResponse<RecursiveForecastResult>, ApiError> {
    req.validate()?;
    let ctx = state.context(&session).await?;
    let result = ctx.forecast_recursive(&req)?;
    let count = result.days.len();
    Ok(ApiResponse::success(result).with_count(count))
}

/// POST /api/v1/forecast/gas - Gas demand for a given peak and solar output
pub async fn forecast_gas(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(req): Json<GasForecastRequest>,
) -> Result<ApiResponse<GasForecastResult>, ApiError> {
    req.validate()?;
    let ctx = state.context(&session).await?;
    Ok(ApiResponse::success(ctx.forecast_gas(&req)?))
}
