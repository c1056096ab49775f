use super::auth::Principal;
use crate::{
    api::{ApiError, AppState, ErrorBody},
    resolver::CacheStatus,
};
use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Substring of the subject, at least two characters.
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<String>,
    pub cached: bool,
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching subjects, at most 25", body = SearchResponse),
        (status = 400, description = "Malformed query string or query shorter than two characters", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "webfinger"
)]
pub async fn search(
    Extension(state): Extension<AppState>,
    _principal: Principal,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let outcome = state
        .resolver
        .search(params.q.as_deref().unwrap_or_default())
        .await?;

    Ok((
        StatusCode::OK,
        Json(SearchResponse {
            query: outcome.query,
            results: outcome.results,
            cached: outcome.cache == CacheStatus::Hit,
        }),
    ))
}
