use super::{principal::BearerCredential, types::RefreshResponse, utils::client_descriptor};
use crate::api::{pipeline::ClientAddress, ApiError, AppState, ErrorBody};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

/// Exchange a live credential for a new one. The old credential stops working.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New credential issued", body = RefreshResponse),
        (status = 401, description = "Credential is missing or no longer live", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn refresh(
    Extension(state): Extension<AppState>,
    client: Option<Extension<ClientAddress>>,
    headers: HeaderMap,
    BearerCredential(credential): BearerCredential,
) -> Result<impl IntoResponse, ApiError> {
    let origin = client.map(|Extension(ClientAddress(address))| address);
    let issued = state
        .tokens
        .refresh(
            &credential,
            origin.as_deref(),
            client_descriptor(&headers).as_deref(),
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            credential: issued.credential,
            expires_at: issued.expires_at,
        }),
    ))
}
