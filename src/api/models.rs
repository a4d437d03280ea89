use axum::extract::State;

use super::{error::ApiError, response::ApiResponse, session::SessionId};
use crate::{controller::AppState, pipeline::ModelsReport};

/// GET /api/v1/models - Held-out metrics, features and quality per target
pub async fn get_models(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Result<ApiResponse<ModelsReport>, ApiError> {
    let ctx = state.context(&session).await?;
    let report = ctx.models_report();
    let count = report.models.len();
    Ok(ApiResponse::success(report).with_count(count).with_session(session))
}
