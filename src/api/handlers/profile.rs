use super::auth::{types::SubjectSummary, Principal};
use crate::api::{ApiError, AppState, ErrorBody};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile of the caller", body = SubjectSummary),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn profile(
    Extension(state): Extension<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .find_by_id(principal.user_id())
        .await?
        .ok_or_else(|| ApiError::NotFound("account not found".to_string()))?;

    Ok((StatusCode::OK, Json(SubjectSummary::from(&user))))
}
