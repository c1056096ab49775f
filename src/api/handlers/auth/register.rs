use super::{
    types::{RegisterRequest, SubjectSummary},
    utils::{normalize_email, normalize_username, valid_email, valid_password, valid_username},
};
use crate::{
    api::{ApiError, AppState, ErrorBody},
    users::{password::hash_password, NewUser},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SubjectSummary),
        (status = 400, description = "Invalid username, email or password", body = ErrorBody),
        (status = 409, description = "Username or email already registered", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(state): Extension<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let username = normalize_username(&request.username);
    let email = normalize_email(&request.email);

    if !valid_username(&username) {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters of a-z, 0-9, '_', '.' or '-'".to_string(),
        ));
    }
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("invalid email address".to_string()));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let password = request.password;
    let phc = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(format!("password hashing task failed: {err}")))??;

    let new_user = NewUser::new(&username, &email, phc)
        .ok_or_else(|| ApiError::BadRequest("invalid email address".to_string()))?;

    let user = state.users.create(&new_user).await?;

    // A new subject can change any cached search result.
    if let Err(err) = state.resolver.invalidate_searches().await {
        warn!("failed to invalidate cached searches after registration: {err}");
    }

    info!(user_id = user.id, subject = %user.subject, "account registered");

    Ok((StatusCode::CREATED, Json(SubjectSummary::from(&user))))
}
