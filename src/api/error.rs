//! One error type for every handler and pipeline stage.
//!
//! Bodies are always `{"error": "<message>"}`. Server-side failures are logged here and
//! the body carries a generic message only.

use crate::{
    cache::CacheError,
    resolver::ResolveError,
    resource::ResourceKeyError,
    token::TokenError,
    users::{password::PasswordError, UserStoreError},
};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Missing, invalid, expired or revoked credential, or a failed login.
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Throttled { retry_after: Duration },
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message) => message.clone(),
            Self::Throttled { .. } => "too many requests".to_string(),
            Self::Unavailable(_) => "service unavailable".to_string(),
            Self::Internal(_) => "internal server error".to_string(),
        }
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_seconds(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    let secs = if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    };
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) | Self::Unavailable(detail) => error!("{detail}"),
            Self::NotFound(message) => debug!("not found: {message}"),
            _ => {}
        }

        let status = self.status();
        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        let mut response = (status, body).into_response();

        if let Self::Throttled { retry_after } = self {
            response.headers_mut().insert(
                RETRY_AFTER,
                HeaderValue::from(retry_after_seconds(retry_after)),
            );
        }
        response
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        if err.is_unauthenticated() {
            Self::Unauthorized(err.to_string())
        } else {
            Self::Internal(format!("token service: {err}"))
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => Self::NotFound(err.to_string()),
            ResolveError::QueryTooShort => Self::BadRequest(err.to_string()),
            ResolveError::Store(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Conflict => Self::Conflict(err.to_string()),
            UserStoreError::Backend { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<ResourceKeyError> for ApiError {
    fn from(err: ResourceKeyError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

// Keep malformed bodies and query strings on the same `{"error": ..}` shape as every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStoreError;
    use anyhow::Result;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> Result<(StatusCode, serde_json::Value)> {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    #[tokio::test]
    async fn internal_details_stay_out_of_the_body() -> Result<()> {
        let (status, body) =
            body_of(ApiError::Internal("db password is hunter2".to_string())).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "internal server error"}));
        Ok(())
    }

    #[tokio::test]
    async fn client_errors_are_verbatim() -> Result<()> {
        let (status, body) = body_of(ApiError::BadRequest("missing resource".to_string())).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing resource");
        Ok(())
    }

    #[test]
    fn throttled_sets_retry_after() {
        let response = ApiError::Throttled {
            retry_after: Duration::from_millis(1500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok()),
            Some("2")
        );
    }

    #[test]
    fn retry_after_is_never_zero() {
        assert_eq!(retry_after_seconds(Duration::ZERO), 1);
        assert_eq!(retry_after_seconds(Duration::from_millis(100)), 1);
        assert_eq!(retry_after_seconds(Duration::from_secs(3)), 3);
    }

    #[test]
    fn token_errors_split_between_401_and_500() {
        assert_eq!(
            ApiError::from(TokenError::SessionNotFound).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TokenError::SessionExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        let persistence = TokenError::Persistence(SessionStoreError::backend("fetch_live", "down"));
        assert_eq!(
            ApiError::from(persistence).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_resource_keys_are_bad_requests() {
        assert_eq!(
            ApiError::from(ResourceKeyError::Shape).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn user_conflicts_map_to_409() {
        assert_eq!(
            ApiError::from(UserStoreError::Conflict).status(),
            StatusCode::CONFLICT
        );
    }
}
