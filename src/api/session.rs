use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName},
};

use super::error::ApiError;
use crate::controller::DEFAULT_SESSION;

pub static SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

const MAX_SESSION_ID_LEN: usize = 64;

/// Session selected by the `x-session-id` header; `default` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(&SESSION_HEADER) else {
            return Ok(Self(DEFAULT_SESSION.to_string()));
        };
        let id = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("x-session-id must be visible ASCII".to_string()))?
            .trim();
        if id.is_empty()
            || id.len() > MAX_SESSION_ID_LEN
            || !id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ApiError::BadRequest(format!(
                "x-session-id must be 1-{MAX_SESSION_ID_LEN} characters of [A-Za-z0-9._-]"
            )));
        }
        Ok(Self(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<SessionId, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header("x-session-id", h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        SessionId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_default_when_absent() {
        assert_eq!(extract(None).await.unwrap(), SessionId("default".into()));
    }

    #[tokio::test]
    async fn test_header_selects_session() {
        assert_eq!(extract(Some("team-a")).await.unwrap(), SessionId("team-a".into()));
        assert!(extract(Some("../etc")).await.is_err());
        assert!(extract(Some("")).await.is_err());
    }
}
