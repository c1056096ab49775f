//! `GET /.well-known/webfinger`
//!
//! Public lookup of a single resource. `rel` may repeat, so the query string is parsed
//! by hand instead of through `Query<T>`.

use crate::{
    api::{ApiError, AppState, ErrorBody},
    resolver::Resolved,
    resource::{Jrd, ResourceKey, CONTENT_TYPE_JRD},
};
use axum::{
    extract::{Extension, RawQuery},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
        HeaderName, HeaderValue,
    },
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

pub const X_CACHE: &str = "x-cache";

#[derive(Debug, Default, PartialEq, Eq)]
struct WebFingerQuery {
    resource: Option<String>,
    rels: Vec<String>,
}

fn parse_query(raw: &str) -> WebFingerQuery {
    url::form_urlencoded::parse(raw.as_bytes()).fold(
        WebFingerQuery::default(),
        |mut query, (name, value)| {
            match name.as_ref() {
                // first one wins
                "resource" if query.resource.is_none() => query.resource = Some(value.into_owned()),
                "rel" => query.rels.push(value.into_owned()),
                _ => {}
            }
            query
        },
    )
}

#[utoipa::path(
    get,
    path = "/.well-known/webfinger",
    params(
        ("resource" = String, Query, description = "Resource key, e.g. acct:alice@example.com"),
        ("rel" = Option<Vec<String>>, Query, description = "Only return links with these relations"),
    ),
    responses(
        (status = 200, description = "Resource descriptor", body = Jrd, content_type = "application/jrd+json"),
        (status = 400, description = "Missing or malformed resource", body = ErrorBody),
        (status = 404, description = "Unknown resource", body = ErrorBody),
    ),
    tag = "webfinger"
)]
pub async fn webfinger(
    Extension(state): Extension<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    state.metrics.record_webfinger_request();

    let query = parse_query(raw.as_deref().unwrap_or_default());
    let resource = query
        .resource
        .ok_or_else(|| ApiError::BadRequest("missing resource parameter".to_string()))?;
    let key = ResourceKey::parse(&resource)?;

    let Resolved { record, cache } = state.resolver.resolve(&key).await?;
    debug!(resource = %key, cache = cache.as_header_value(), "webfinger resolved");

    let mut response = Json(record.filter_rels(&query.rels)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JRD));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        HeaderName::from_static(X_CACHE),
        HeaderValue::from_static(cache.as_header_value()),
    );

    Ok(response)
}
