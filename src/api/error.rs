use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::SessionError;
use crate::forecast::ForecastError;
use crate::repo::DataError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid dataset: {0}")]
    InvalidData(String),

    #[error("Data source error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) => StatusCode::CONFLICT,
            ApiError::InvalidData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::ModelUnavailable(_) => "ModelUnavailable",
            ApiError::InvalidData(_) => "InvalidData",
            ApiError::Upstream(_) => "UpstreamError",
            ApiError::InternalError(_) => "InternalServerError",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            ApiError::ServiceUnavailable(_) | ApiError::Upstream(_) => {
                tracing::warn!(error = %self, "data source unavailable");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::EmptySheet
            | DataError::MalformedHeader(_)
            | DataError::MissingColumns(_)
            | DataError::InvalidCell { .. }
            | DataError::DuplicateDate(_) => ApiError::InvalidData(error.to_string()),
            e if e.is_transient() && !matches!(e, DataError::Io(_)) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            e @ (DataError::Http { .. } | DataError::Transport(_) | DataError::Decode(_)) => {
                ApiError::Upstream(e.to_string())
            }
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<ForecastError> for ApiError {
    fn from(error: ForecastError) -> Self {
        match error {
            ForecastError::ModelUnavailable(_) => ApiError::ModelUnavailable(error.to_string()),
            ForecastError::MissingInput(_) | ForecastError::InvalidInput(_) => {
                ApiError::BadRequest(error.to_string())
            }
            ForecastError::Prediction(_) => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Data(e) => e.into(),
            SessionError::Forecast(e) => e.into(),
            SessionError::Task(_) => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::InternalError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}
