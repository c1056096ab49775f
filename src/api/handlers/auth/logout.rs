use super::{
    principal::{BearerCredential, Principal},
    types::{LogoutResponse, RevokedResponse},
};
use crate::api::{ApiError, AppState, ErrorBody};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::{debug, error};

/// Revocation is best-effort: an unknown, expired or already revoked credential still
/// gets a 200.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked, or there was none", body = LogoutResponse),
        (status = 401, description = "No bearer credential supplied", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<AppState>,
    BearerCredential(credential): BearerCredential,
) -> impl IntoResponse {
    match state.tokens.revoke(&credential).await {
        Ok(()) => debug!("logout processed"),
        Err(err) => error!("Failed to revoke session on logout: {err}"),
    }

    (StatusCode::OK, Json(LogoutResponse { logged_out: true }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses(
        (status = 200, description = "Every session of the caller revoked", body = RevokedResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout_all(
    Extension(state): Extension<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state.tokens.revoke_all(principal.user_id()).await?;
    Ok((StatusCode::OK, Json(RevokedResponse { revoked })))
}
