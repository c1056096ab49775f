//! Operator endpoints. Every handler takes an [`AdminPrincipal`], so non-admin callers
//! get a 403 before any work happens.

use super::auth::{types::RevokedResponse, AdminPrincipal};
use crate::{
    api::{ApiError, AppState, ErrorBody},
    cache::CacheStats,
    metrics::MetricsSnapshot,
    resource::ResourceKey,
    users::UserCounts,
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStats {
    pub users: UserCounts,
    pub metrics: MetricsSnapshot,
    /// Absent when the cache backend could not report.
    pub cache: Option<CacheStats>,
    pub rate_limited_clients: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeSessionsRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvalidateRequest {
    pub resource: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvalidateResponse {
    pub resource: String,
    pub invalidated: bool,
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Service statistics", body = AdminStats),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn stats(
    Extension(state): Extension<AppState>,
    _admin: AdminPrincipal,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.counts().await?;
    let cache = match state.resolver.cache_stats().await {
        Ok(stats) => Some(stats),
        Err(err) => {
            warn!("cache stats unavailable: {err}");
            None
        }
    };

    Ok((
        StatusCode::OK,
        Json(AdminStats {
            users,
            metrics: state.metrics.snapshot(),
            cache,
            rate_limited_clients: state.limiter.tracked_clients(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/sessions/revoke",
    request_body = RevokeSessionsRequest,
    responses(
        (status = 200, description = "Every session of the user revoked", body = RevokedResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn revoke_sessions(
    Extension(state): Extension<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    payload: Result<Json<RevokeSessionsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let revoked = state.tokens.revoke_all(request.user_id).await?;

    info!(
        admin_id = admin.user_id(),
        user_id = request.user_id,
        revoked,
        "admin revoked sessions"
    );

    Ok((StatusCode::OK, Json(RevokedResponse { revoked })))
}

#[utoipa::path(
    post,
    path = "/api/admin/cache/invalidate",
    request_body = InvalidateRequest,
    responses(
        (status = 200, description = "Cached record and searches dropped", body = InvalidateResponse),
        (status = 400, description = "Malformed resource", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 503, description = "Cache backend unavailable", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn invalidate_cache(
    Extension(state): Extension<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    payload: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let key = ResourceKey::parse(&request.resource)?;
    state.resolver.invalidate(&key).await?;

    info!(admin_id = admin.user_id(), resource = %key, "admin invalidated cache entry");

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            resource: key.to_string(),
            invalidated: true,
        }),
    ))
}
