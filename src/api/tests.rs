//! End-to-end router tests over the in-memory stores.

use super::{app, pipeline::PipelineConfig, AppState};
use crate::{
    cache::{CacheConfig, MemoryCache},
    metrics::Metrics,
    ratelimit::{RateLimitConfig, RateLimiter},
    resolver::ResourceResolver,
    resource::{Jrd, Link, MemoryResourceStore},
    session::MemorySessionStore,
    token::{TokenConfig, TokenService},
    users::{password::hash_password, MemoryUserStore, NewUser, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, X_CONTENT_TYPE_OPTIONS},
        HeaderMap, Request as HttpRequest, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "router-test-secret-router-test-secret";
const EXAMPLE: &str = "/.well-known/webfinger?resource=acct:example@example.com";

pub(crate) struct TestContext {
    pub state: AppState,
    pub cache: Arc<MemoryCache>,
    pub resources: Arc<MemoryResourceStore>,
    pub users: Arc<MemoryUserStore>,
}

pub(crate) fn test_state() -> Result<TestContext> {
    test_state_with(RateLimitConfig::new().with_burst(1_000))
}

pub(crate) fn test_state_with(limits: RateLimitConfig) -> Result<TestContext> {
    let metrics = Arc::new(Metrics::new());
    let tokens = TokenService::new(
        SecretString::from(SECRET.to_string()),
        TokenConfig::new(),
        Arc::new(MemorySessionStore::new()),
        metrics.clone(),
    )
    .context("failed to build token service")?;

    let config = CacheConfig::new();
    let cache = Arc::new(MemoryCache::new(&config));
    let resources = Arc::new(MemoryResourceStore::new());
    let resolver = ResourceResolver::new(cache.clone(), resources.clone(), config, metrics.clone());
    let users = Arc::new(MemoryUserStore::new().with_resources(resources.clone()));

    let state = AppState {
        tokens: Arc::new(tokens),
        resolver: Arc::new(resolver),
        users: users.clone(),
        limiter: Arc::new(RateLimiter::new(limits)),
        metrics,
    };

    Ok(TestContext {
        state,
        cache,
        resources,
        users,
    })
}

fn example_record() -> Jrd {
    let mut record = Jrd::new("acct:example@example.com");
    record.aliases = vec!["https://example.com/@example".to_string()];
    record.links = vec![
        Link {
            rel: "self".to_string(),
            media_type: Some("application/activity+json".to_string()),
            href: Some("https://example.com/users/example".to_string()),
        },
        Link {
            rel: "http://webfinger.net/rel/profile-page".to_string(),
            media_type: Some("text/html".to_string()),
            href: Some("https://example.com/@example".to_string()),
        },
    ];
    record
}

async fn router(context: &TestContext) -> Result<Router> {
    context.resources.upsert(example_record()).await;
    app(context.state.clone(), &PipelineConfig::default())
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(router: &Router, request: HttpRequest<Body>) -> Result<Reply> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok(Reply {
        status,
        headers,
        body,
    })
}

fn get(uri: &str, bearer: Option<&str>) -> Result<HttpRequest<Body>> {
    let mut builder = HttpRequest::builder().method("GET").uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {bearer}"));
    }
    Ok(builder.body(Body::empty())?)
}

fn post(uri: &str, body: &Value, bearer: Option<&str>) -> Result<HttpRequest<Body>> {
    let mut builder = HttpRequest::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {bearer}"));
    }
    Ok(builder.body(Body::from(serde_json::to_vec(body)?))?)
}

async fn register(router: &Router, username: &str, email: &str, password: &str) -> Result<Reply> {
    send(
        router,
        post(
            "/api/auth/register",
            &json!({"username": username, "email": email, "password": password}),
            None,
        )?,
    )
    .await
}

async fn login(router: &Router, username_or_email: &str, password: &str) -> Result<Reply> {
    send(
        router,
        post(
            "/api/auth/login",
            &json!({"username_or_email": username_or_email, "password": password}),
            None,
        )?,
    )
    .await
}

async fn credential_for(router: &Router, username: &str, password: &str) -> Result<String> {
    let reply = login(router, username, password).await?;
    assert_eq!(reply.status, StatusCode::CREATED, "login body: {}", reply.body);
    reply.body["credential"]
        .as_str()
        .map(str::to_string)
        .context("login response without credential")
}

async fn create_admin(context: &TestContext) -> Result<()> {
    let phc = hash_password("admin-password")?;
    let admin = NewUser::new("root", "root@example.com", phc)
        .context("invalid admin email")?
        .with_admin(true);
    context.users.create(&admin).await?;
    Ok(())
}

#[tokio::test]
async fn login_then_profile() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let registered = register(&router, "alice", "alice@example.com", "password123").await?;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["subject"], "acct:alice@example.com");
    assert!(registered.body.get("password_hash").is_none());

    let reply = login(&router, "alice", "password123").await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["subject_summary"]["username"], "alice");
    assert!(reply.body["expires_at"].is_string());
    let credential = reply.body["credential"]
        .as_str()
        .context("missing credential")?;
    assert_eq!(credential.split('.').count(), 3);

    let profile = send(&router, get("/api/profile", Some(credential))?).await?;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["username"], "alice");
    assert_eq!(profile.body["email"], "alice@example.com");
    assert!(profile.body.get("password").is_none());
    assert!(profile.body.get("password_hash").is_none());

    let snapshot = context.state.metrics.snapshot();
    assert_eq!(snapshot.auth_success, 1);
    assert_eq!(snapshot.sessions_issued, 1);
    Ok(())
}

#[tokio::test]
async fn login_by_email_is_case_insensitive() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;

    let reply = login(&router, "Alice@Example.com", "password123").await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;

    let wrong_password = login(&router, "alice", "not-the-password").await?;
    let unknown_user = login(&router, "mallory", "password123").await?;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(context.state.metrics.snapshot().auth_failure, 2);
    Ok(())
}

#[tokio::test]
async fn deactivated_account_is_forbidden() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    let registered = register(&router, "bob", "bob@example.com", "password123").await?;
    let id = registered.body["id"].as_i64().context("missing id")?;
    assert!(context.users.set_active(id, false).await);

    let reply = login(&router, "bob", "password123").await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    // a wrong password still reads as a plain 401
    let reply = login(&router, "bob", "wrong-password").await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn registration_validation_and_conflicts() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let short = register(&router, "al", "al@example.com", "password123").await?;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    let bad_email = register(&router, "alice", "not-an-email", "password123").await?;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    let weak = register(&router, "alice", "alice@example.com", "short").await?;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert!(weak.body["error"].is_string());

    let first = register(&router, "alice", "alice@example.com", "password123").await?;
    assert_eq!(first.status, StatusCode::CREATED);
    let same_username = register(&router, "Alice", "other@example.com", "password123").await?;
    assert_eq!(same_username.status, StatusCode::CONFLICT);
    let same_email = register(&router, "alice2", "ALICE@example.com", "password123").await?;
    assert_eq!(same_email.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn malformed_json_gets_the_error_shape() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let reply = send(&router, request).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn refresh_invalidates_the_old_credential() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let first = credential_for(&router, "alice", "password123").await?;

    let refreshed = send(&router, post("/api/auth/refresh", &json!({}), Some(&first))?).await?;
    assert_eq!(refreshed.status, StatusCode::OK);
    let second = refreshed.body["credential"]
        .as_str()
        .context("missing credential")?
        .to_string();
    assert_ne!(first, second);

    let old = send(&router, get("/api/profile", Some(&first))?).await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = send(&router, get("/api/profile", Some(&second))?).await?;
    assert_eq!(new.status, StatusCode::OK);

    let again = send(&router, post("/api/auth/refresh", &json!({}), Some(&first))?).await?;
    assert_eq!(again.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_always_succeeds() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let credential = credential_for(&router, "alice", "password123").await?;

    let reply = send(&router, post("/api/auth/logout", &json!({}), Some(&credential))?).await?;
    assert_eq!(reply.status, StatusCode::OK);

    let profile = send(&router, get("/api/profile", Some(&credential))?).await?;
    assert_eq!(profile.status, StatusCode::UNAUTHORIZED);

    // already revoked, and plain garbage
    let reply = send(&router, post("/api/auth/logout", &json!({}), Some(&credential))?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = send(&router, post("/api/auth/logout", &json!({}), Some("a.b.c"))?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn sessions_listing_and_logout_everywhere() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let laptop = credential_for(&router, "alice", "password123").await?;
    let phone = credential_for(&router, "alice", "password123").await?;

    let listed = send(&router, get("/api/auth/sessions", Some(&laptop))?).await?;
    assert_eq!(listed.status, StatusCode::OK);
    let sessions = listed.body.as_array().context("expected an array")?;
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions
            .iter()
            .filter(|session| session["current"] == json!(true))
            .count(),
        1
    );
    assert!(sessions
        .iter()
        .all(|session| session.get("credential_hash").is_none()));

    let reply = send(&router, post("/api/auth/logout-all", &json!({}), Some(&phone))?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["revoked"], 2);

    for credential in [&laptop, &phone] {
        let profile = send(&router, get("/api/profile", Some(credential))?).await?;
        assert_eq!(profile.status, StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_credential() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    for uri in ["/api/profile", "/api/auth/sessions", "/api/search?q=ex", "/api/admin/stats"] {
        let reply = send(&router, get(uri, None)?).await?;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(reply.body["error"].is_string());
    }

    let reply = send(&router, get("/api/profile", Some("not-a-token"))?).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn webfinger_miss_then_hit() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let first = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers["x-cache"], "MISS");
    assert_eq!(first.headers[CONTENT_TYPE], "application/jrd+json");
    assert_eq!(first.headers["access-control-allow-origin"], "*");
    assert_eq!(first.body["subject"], "acct:example@example.com");

    let second = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.headers["x-cache"], "HIT");
    assert_eq!(first.body, second.body);

    let snapshot = context.state.metrics.snapshot();
    assert_eq!(snapshot.webfinger_requests, 2);
    assert_eq!(snapshot.cache_hits, 1);
    Ok(())
}

#[tokio::test]
async fn webfinger_input_errors_and_misses() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let missing = send(&router, get("/.well-known/webfinger", None)?).await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(missing.body["error"].is_string());

    let malformed = send(&router, get("/.well-known/webfinger?resource=nobody", None)?).await?;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let unknown = send(
        &router,
        get("/.well-known/webfinger?resource=acct:ghost@example.com", None)?,
    )
    .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    // misses are not cached, so a record published afterwards resolves at once
    context
        .resources
        .upsert(Jrd::new("acct:ghost@example.com"))
        .await;
    let found = send(
        &router,
        get("/.well-known/webfinger?resource=acct:ghost@example.com", None)?,
    )
    .await?;
    assert_eq!(found.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn webfinger_filters_links_by_rel() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let reply = send(&router, get(&format!("{EXAMPLE}&rel=self"), None)?).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let links = reply.body["links"].as_array().context("expected links")?;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["rel"], "self");
    assert_eq!(links[0]["type"], "application/activity+json");
    Ok(())
}

#[tokio::test]
async fn registered_users_resolve_over_webfinger() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;

    let reply = send(
        &router,
        get("/.well-known/webfinger?resource=alice@example.com", None)?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["subject"], "acct:alice@example.com");
    Ok(())
}

#[tokio::test]
async fn responses_carry_pipeline_headers() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let reply = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(reply.headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(reply.headers["x-frame-options"], "DENY");
    assert!(reply.headers.contains_key("referrer-policy"));
    assert!(reply.headers.contains_key("content-security-policy"));
    assert!(reply.headers.contains_key("x-request-id"));

    let request = HttpRequest::builder()
        .uri(EXAMPLE)
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let reply = send(&router, request).await?;
    assert_eq!(reply.headers["x-request-id"], "req-123");
    Ok(())
}

#[tokio::test]
async fn search_is_cached_and_validated() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let credential = credential_for(&router, "alice", "password123").await?;

    let short = send(&router, get("/api/search?q=a", Some(&credential))?).await?;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let first = send(&router, get("/api/search?q=EXAMPLE", Some(&credential))?).await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["query"], "example");
    assert_eq!(first.body["cached"], false);
    assert_eq!(
        first.body["results"],
        json!(["acct:alice@example.com", "acct:example@example.com"])
    );

    let second = send(&router, get("/api/search?q=example", Some(&credential))?).await?;
    assert_eq!(second.body["cached"], true);
    assert_eq!(first.body["results"], second.body["results"]);

    let empty = send(&router, get("/api/search?q=zzz", Some(&credential))?).await?;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["results"], json!([]));
    Ok(())
}

#[tokio::test]
async fn malformed_search_query_keeps_error_shape() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let credential = credential_for(&router, "alice", "password123").await?;

    let reply = send(&router, get("/api/search?q=ab&q=cd", Some(&credential))?).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn admin_routes_are_gated() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    create_admin(&context).await?;
    register(&router, "alice", "alice@example.com", "password123").await?;
    let alice = credential_for(&router, "alice", "password123").await?;
    let admin = credential_for(&router, "root", "admin-password").await?;

    let denied = send(&router, get("/api/admin/stats", Some(&alice))?).await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let denied = send(
        &router,
        post(
            "/api/admin/cache/invalidate",
            &json!({"resource": "acct:example@example.com"}),
            Some(&alice),
        )?,
    )
    .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let stats = send(&router, get("/api/admin/stats", Some(&admin))?).await?;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["users"]["total"], 2);
    assert_eq!(stats.body["users"]["admins"], 1);
    assert_eq!(stats.body["cache"]["backend"], "memory");
    assert_eq!(stats.body["metrics"]["sessions_issued"], 2);
    Ok(())
}

#[tokio::test]
async fn admin_can_revoke_sessions_of_any_user() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    create_admin(&context).await?;
    let registered = register(&router, "alice", "alice@example.com", "password123").await?;
    let alice_id = registered.body["id"].as_i64().context("missing id")?;
    let alice = credential_for(&router, "alice", "password123").await?;
    let admin = credential_for(&router, "root", "admin-password").await?;

    let reply = send(
        &router,
        post(
            "/api/admin/sessions/revoke",
            &json!({"user_id": alice_id}),
            Some(&admin),
        )?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["revoked"], 1);

    let profile = send(&router, get("/api/profile", Some(&alice))?).await?;
    assert_eq!(profile.status, StatusCode::UNAUTHORIZED);
    let own = send(&router, get("/api/profile", Some(&admin))?).await?;
    assert_eq!(own.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admin_cache_invalidation_forces_a_miss() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    create_admin(&context).await?;
    let admin = credential_for(&router, "root", "admin-password").await?;

    send(&router, get(EXAMPLE, None)?).await?;
    let hit = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(hit.headers["x-cache"], "HIT");

    let reply = send(
        &router,
        post(
            "/api/admin/cache/invalidate",
            &json!({"resource": "ACCT:example@EXAMPLE.com"}),
            Some(&admin),
        )?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["resource"], "acct:example@example.com");

    let miss = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(miss.headers["x-cache"], "MISS");

    let bad = send(
        &router,
        post(
            "/api/admin/cache/invalidate",
            &json!({"resource": "no-at-sign"}),
            Some(&admin),
        )?,
    )
    .await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn throttling_is_429_not_401() -> Result<()> {
    let context = test_state_with(
        RateLimitConfig::new()
            .with_rate_per_second(0.001)
            .with_burst(1),
    )?;
    let router = router(&context).await?;

    let first = send(&router, get("/api/profile", None)?).await?;
    assert_eq!(first.status, StatusCode::UNAUTHORIZED);

    let second = send(&router, get("/api/profile", None)?).await?;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers.contains_key(RETRY_AFTER));
    assert_eq!(second.headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(second.body["error"], "too many requests");
    assert_eq!(context.state.metrics.snapshot().throttled, 1);
    Ok(())
}

#[tokio::test]
async fn health_reports_database_status() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;

    let healthy = send(&router, get("/health", None)?).await?;
    assert_eq!(healthy.status, StatusCode::OK);
    assert_eq!(healthy.body["database"], "ok");
    assert_eq!(healthy.body["name"], env!("CARGO_PKG_NAME"));
    let x_app = healthy.headers["x-app"].to_str()?;
    assert!(x_app.starts_with(concat!(env!("CARGO_PKG_NAME"), ":", env!("CARGO_PKG_VERSION"))));

    context.resources.set_available(false);
    let unhealthy = send(&router, get("/health", None)?).await?;
    assert_eq!(unhealthy.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(unhealthy.body["database"], "error");
    Ok(())
}

#[tokio::test]
async fn store_outage_is_a_server_error_not_a_miss() -> Result<()> {
    let context = test_state()?;
    let router = router(&context).await?;
    context.resources.set_available(false);

    let reply = send(&router, get(EXAMPLE, None)?).await?;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["error"], "internal server error");
    Ok(())
}
