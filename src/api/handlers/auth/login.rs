//! Password login.
//!
//! Flow Overview:
//! 1) Look the account up by email (input contains `@`) or username.
//! 2) Verify the password off the async runtime. Unknown accounts still pay for one
//!    Argon2 verification so timing does not reveal which usernames exist.
//! 3) Reject deactivated accounts only after the password matched.
//! 4) Issue a credential and record the session.

use super::{
    types::{LoginRequest, LoginResponse, SubjectSummary},
    utils::{client_descriptor, normalize_email, normalize_username},
};
use crate::{
    api::{pipeline::ClientAddress, ApiError, AppState, ErrorBody},
    token::TokenSubject,
    users::password::verify_or_burn,
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

const INVALID_CREDENTIALS: &str = "invalid username or password";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Credential issued", body = LoginResponse),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 401, description = "Unknown account or wrong password", body = ErrorBody),
        (status = 403, description = "Account is deactivated", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<AppState>,
    client: Option<Extension<ClientAddress>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let identifier = request.username_or_email.trim();
    let user = if identifier.contains('@') {
        state.users.find_by_email(&normalize_email(identifier)).await?
    } else {
        state
            .users
            .find_by_username(&normalize_username(identifier))
            .await?
    };

    let phc = user.as_ref().and_then(|user| user.password_hash.clone());
    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || verify_or_burn(&password, phc.as_deref()))
        .await
        .map_err(|err| ApiError::Internal(format!("password verification task failed: {err}")))?;

    let Some(user) = user.filter(|_| verified) else {
        state.metrics.record_auth_attempt(false);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !user.is_active {
        state.metrics.record_auth_attempt(false);
        return Err(ApiError::Forbidden("account is deactivated".to_string()));
    }

    let subject = TokenSubject {
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
    };
    let origin = client.map(|Extension(ClientAddress(address))| address);
    let issued = state
        .tokens
        .issue(&subject, origin.as_deref(), client_descriptor(&headers).as_deref())
        .await?;

    state.metrics.record_auth_attempt(true);

    if let Err(err) = state.users.touch_last_login(user.id).await {
        warn!(user_id = user.id, "failed to record last login: {err}");
    }

    info!(user_id = user.id, "login succeeded");

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            credential: issued.credential,
            subject_summary: SubjectSummary::from(&user),
            expires_at: issued.expires_at,
        }),
    ))
}
