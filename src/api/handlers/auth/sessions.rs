use super::{principal::Principal, types::SessionView};
use crate::{
    api::{ApiError, AppState, ErrorBody},
    token::hash_credential,
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

#[utoipa::path(
    get,
    path = "/api/auth/sessions",
    responses(
        (status = 200, description = "Live sessions of the caller, newest first", body = [SessionView]),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn list_sessions(
    Extension(state): Extension<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let current = hash_credential(&principal.credential);
    let sessions: Vec<SessionView> = state
        .tokens
        .sessions(principal.user_id())
        .await?
        .into_iter()
        .map(|session| SessionView::from_session(session, &current))
        .collect();

    Ok((StatusCode::OK, Json(sessions)))
}
