use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Envelope around every successful JSON body.
///
/// Failures are rendered by [`super::error::ApiError`] instead, so `error`
/// is only ever set by callers that want a soft failure inside a 200.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseMetadata {
    /// Rows in the returned collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    /// Session whose dataset answered the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    fn metadata_mut(&mut self) -> &mut ResponseMetadata {
        self.metadata.get_or_insert_with(ResponseMetadata::default)
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.metadata_mut().total_count = Some(count);
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.metadata_mut().session = Some(session.into());
        self
    }

    /// Wall time spent in the handler, e.g. for retraining after a save.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.metadata_mut().duration_ms = Some(duration_ms);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}
