use crate::{
    cache::{CacheConfig, MemoryCache, ResourceCache},
    metrics::Metrics,
    ratelimit::{RateLimitConfig, RateLimiter},
    resolver::ResourceResolver,
    resource::{PgResourceStore, ResourceStore},
    session::{PgSessionStore, SessionStore},
    token::{TokenConfig, TokenService},
    users::{PgUserStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::options,
    Extension, Router,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, warn, Span};
use ulid::Ulid;

mod error;
pub mod handlers;
pub mod maintenance;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use error::{ApiError, ErrorBody};
pub use openapi::openapi;

use handlers::health;
use pipeline::{PipelineConfig, RateLimitStage};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Everything handlers need, shared through a request extension.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub resolver: Arc<ResourceResolver>,
    pub users: Arc<dyn UserStore>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

/// Server configuration assembled by the CLI.
pub struct ServerSettings {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub tokens: TokenConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub pipeline: PipelineConfig,
    pub maintenance_interval: Duration,
}

/// Build the application router with every pipeline stage attached.
///
/// Request-side order is rate limit, CORS, timeout, then the auth gate inside the
/// handler's extractors. The security headers stage only touches responses and wraps
/// the rate limiter, so throttled responses carry the headers too.
///
/// # Errors
///
/// Returns an error if an allowed origin is not a valid header value.
pub fn app(state: AppState, pipeline: &PipelineConfig) -> Result<Router> {
    let rate_limit = RateLimitStage {
        limiter: state.limiter.clone(),
        metrics: state.metrics.clone(),
        trust_proxy_headers: pipeline.trust_proxy_headers,
    };
    let security = Arc::new(pipeline.security.clone());
    let cors = pipeline::cors(&pipeline.allowed_origins)?;

    // Build the router from OpenAPI-wired routes, then extend it with the preflight-only
    // `OPTIONS /health`. The OpenAPI document stays in openapi.rs for the `openapi` binary.
    let (router, _openapi) = openapi::api_router().split_for_parts();

    Ok(router.route("/health", options(health::health)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state))
            .layer(from_fn_with_state(security, pipeline::security_headers))
            .layer(from_fn_with_state(rate_limit, pipeline::rate_limit))
            .layer(cors)
            .layer(TimeoutLayer::new(pipeline.request_timeout)),
    ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(settings: ServerSettings) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&settings.dsn)
        .await
        .context("Failed to connect to database")?;

    let metrics = Arc::new(Metrics::new());

    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let tokens = TokenService::new(
        settings.jwt_secret,
        settings.tokens,
        sessions,
        metrics.clone(),
    )
    .context("Invalid token configuration")?;

    let cache: Arc<dyn ResourceCache> = Arc::new(MemoryCache::new(&settings.cache));
    let store: Arc<dyn ResourceStore> = Arc::new(PgResourceStore::new(pool.clone()));
    let resolver = ResourceResolver::new(cache, store, settings.cache, metrics.clone());

    let state = AppState {
        tokens: Arc::new(tokens),
        resolver: Arc::new(resolver),
        users: Arc::new(PgUserStore::new(pool)),
        limiter: Arc::new(RateLimiter::new(settings.rate_limit)),
        metrics,
    };

    let app = app(state.clone(), &settings.pipeline)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = maintenance::spawn(state, settings.maintenance_interval, shutdown_rx);

    let listener = TcpListener::bind(format!("::0:{}", settings.port)).await?;

    info!("Listening on [::]:{}", settings.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Gracefully shutdown");
        shutdown_tx.send_replace(true);
    })
    .await?;

    if let Err(err) = maintenance.await {
        warn!("Maintenance task ended abnormally: {err}");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
