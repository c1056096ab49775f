//! Request pipeline stages.
//!
//! Composed once in [`super::app`]. Requests pass rate limit, CORS and timeout in that
//! order; the auth gate is the last stage and lives in the
//! [`Principal`](super::handlers::auth::Principal) extractor. Security headers are a
//! response-only stage wrapped around the rate limiter, so 429s carry them as well.

use super::{handlers::auth::utils::extract_client_ip, ApiError};
use crate::{
    metrics::Metrics,
    ratelimit::{RateLimitDecision, RateLimiter},
};
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        header::{
            AUTHORIZATION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY,
            STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        HeaderValue, Method,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

pub const DEFAULT_CSP: &str = "default-src 'none'; frame-ancestors 'none'";
pub const DEFAULT_HSTS: &str = "max-age=31536000; includeSubDomains";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityHeadersConfig {
    csp: Option<String>,
    hsts: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityHeadersConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            csp: Some(DEFAULT_CSP.to_string()),
            hsts: Some(DEFAULT_HSTS.to_string()),
        }
    }

    #[must_use]
    pub fn with_csp(mut self, enabled: bool) -> Self {
        self.csp = enabled.then(|| DEFAULT_CSP.to_string());
        self
    }

    #[must_use]
    pub fn with_hsts(mut self, enabled: bool) -> Self {
        self.hsts = enabled.then(|| DEFAULT_HSTS.to_string());
        self
    }
}

/// Settings for the stages that are not backed by application state.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub security: SecurityHeadersConfig,
    /// `*` allows any origin.
    pub allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Take the client identity from `X-Forwarded-For` / `X-Real-IP`.
    pub trust_proxy_headers: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            security: SecurityHeadersConfig::new(),
            allowed_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            trust_proxy_headers: false,
        }
    }
}

/// Client identity as seen by the rate limiter, for handlers that record it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientAddress(pub String);

#[derive(Clone)]
pub struct RateLimitStage {
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub trust_proxy_headers: bool,
}

fn client_identity(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = extract_client_ip(request.headers()) {
            return ip;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |info| info.0.ip().to_string())
}

pub async fn rate_limit(
    State(stage): State<RateLimitStage>,
    mut request: Request,
    next: Next,
) -> Response {
    let client = client_identity(&request, stage.trust_proxy_headers);

    match stage.limiter.check(&client) {
        RateLimitDecision::Allowed { .. } => {
            request.extensions_mut().insert(ClientAddress(client));
            next.run(request).await
        }
        RateLimitDecision::Throttled { retry_after } => {
            stage.metrics.record_throttled();
            debug!(client = %client, ?retry_after, "request throttled");
            ApiError::Throttled { retry_after }.into_response()
        }
    }
}

pub async fn security_headers(
    State(config): State<Arc<SecurityHeadersConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers
        .entry(X_CONTENT_TYPE_OPTIONS)
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry(X_FRAME_OPTIONS)
        .or_insert(HeaderValue::from_static("DENY"));
    headers
        .entry(REFERRER_POLICY)
        .or_insert(HeaderValue::from_static("strict-origin-when-cross-origin"));

    if let Some(value) = config.csp.as_deref().and_then(|csp| HeaderValue::from_str(csp).ok()) {
        headers.entry(CONTENT_SECURITY_POLICY).or_insert(value);
    }
    if let Some(value) = config
        .hsts
        .as_deref()
        .and_then(|hsts| HeaderValue::from_str(hsts).ok())
    {
        headers.entry(STRICT_TRANSPORT_SECURITY).or_insert(value);
    }

    response
}

/// # Errors
///
/// Returns an error if an origin is not a valid header value.
pub fn cors(allowed_origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).with_context(|| format!("Invalid origin: {origin}"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(allow_origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitConfig;
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{header::RETRY_AFTER, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn echo_client(client: Option<Extension<ClientAddress>>) -> String {
        client.map_or_else(String::new, |Extension(ClientAddress(client))| client)
    }

    fn limited_router(burst: u32, trust_proxy_headers: bool) -> (Router, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let stage = RateLimitStage {
            limiter: Arc::new(RateLimiter::new(
                RateLimitConfig::new()
                    .with_rate_per_second(0.01)
                    .with_burst(burst),
            )),
            metrics: metrics.clone(),
            trust_proxy_headers,
        };
        let router = Router::new()
            .route("/", get(echo_client))
            .layer(from_fn_with_state(stage, rate_limit));
        (router, metrics)
    }

    fn request_from(forwarded: Option<&str>) -> Result<HttpRequest<Body>> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        Ok(builder.body(Body::empty())?)
    }

    #[tokio::test]
    async fn rate_limit_stage_throttles_with_retry_after() -> Result<()> {
        let (router, metrics) = limited_router(1, false);

        let first = router.clone().oneshot(request_from(None)?).await?;
        assert_eq!(first.status(), StatusCode::OK);
        let body = axum::body::to_bytes(first.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"unknown");

        let second = router.oneshot(request_from(None)?).await?;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(RETRY_AFTER));
        assert_eq!(metrics.snapshot().throttled, 1);
        Ok(())
    }

    #[tokio::test]
    async fn proxy_headers_are_ignored_unless_trusted() -> Result<()> {
        let (router, _) = limited_router(1, false);
        let first = router.clone().oneshot(request_from(Some("192.0.2.1"))?).await?;
        assert_eq!(first.status(), StatusCode::OK);
        // same peer ("unknown"), different claimed address
        let second = router.oneshot(request_from(Some("192.0.2.2"))?).await?;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let (router, _) = limited_router(1, true);
        let first = router.clone().oneshot(request_from(Some("192.0.2.1"))?).await?;
        let body = axum::body::to_bytes(first.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"192.0.2.1");
        let second = router.oneshot(request_from(Some("192.0.2.2, 10.0.0.1"))?).await?;
        assert_eq!(second.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn security_headers_stage_sets_defaults() -> Result<()> {
        let router = Router::new().route("/", get(|| async { "ok" })).layer(
            from_fn_with_state(Arc::new(SecurityHeadersConfig::new()), security_headers),
        );
        let response = router.oneshot(request_from(None)?).await?;
        let headers = response.headers();
        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS), Some(&HeaderValue::from_static("nosniff")));
        assert_eq!(headers.get(X_FRAME_OPTIONS), Some(&HeaderValue::from_static("DENY")));
        assert!(headers.contains_key(REFERRER_POLICY));
        assert!(headers.contains_key(CONTENT_SECURITY_POLICY));
        assert!(headers.contains_key(STRICT_TRANSPORT_SECURITY));
        Ok(())
    }

    #[tokio::test]
    async fn optional_security_headers_can_be_disabled() -> Result<()> {
        let config = SecurityHeadersConfig::new().with_csp(false).with_hsts(false);
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(Arc::new(config), security_headers));
        let response = router.oneshot(request_from(None)?).await?;
        assert!(!response.headers().contains_key(CONTENT_SECURITY_POLICY));
        assert!(!response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
        assert!(response.headers().contains_key(X_FRAME_OPTIONS));
        Ok(())
    }

    #[test]
    fn cors_rejects_invalid_origins() {
        assert!(cors(&["*".to_string()]).is_ok());
        assert!(cors(&["https://example.com".to_string()]).is_ok());
        assert!(cors(&["bad\norigin".to_string()]).is_err());
    }
}
