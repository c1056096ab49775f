//! The auth gate.
//!
//! Protected handlers name [`Principal`] or [`AdminPrincipal`] in their signature; the
//! extractor reads the bearer credential, validates it against the session ledger and
//! hands the claims to the handler. Nothing is stored in ambient request state.

use super::utils::extract_bearer_token;
use crate::{
    api::{ApiError, AppState},
    token::Claims,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::fmt;
use tracing::debug;

/// Authenticated caller.
#[derive(Clone)]
pub struct Principal {
    pub claims: Claims,
    /// The raw bearer credential, kept so handlers can tell which session is "this" one.
    pub credential: String,
}

impl Principal {
    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.claims.uid
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.claims.adm
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.claims.uid)
            .field("session_id", &self.claims.jti)
            .finish_non_exhaustive()
    }
}

/// Authenticated caller holding the admin flag.
#[derive(Clone, Debug)]
pub struct AdminPrincipal(pub Principal);

/// The bearer credential without validation, for endpoints that must accept dead
/// credentials (logout) or validate them themselves (refresh).
#[derive(Clone)]
pub struct BearerCredential(pub String);

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerCredential(<redacted>)")
    }
}

fn app_state(parts: &Parts) -> Result<AppState, ApiError> {
    parts
        .extensions
        .get::<AppState>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("application state extension missing".to_string()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers)
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer credential".to_string()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerCredential(credential) = BearerCredential::from_request_parts(parts, state).await?;
        let app = app_state(parts)?;

        let claims = app.tokens.validate(&credential).await.map_err(|err| {
            debug!("rejected credential: {err}");
            ApiError::from(err)
        })?;

        Ok(Self { claims, credential })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            debug!(user_id = principal.user_id(), "admin route denied");
            return Err(ApiError::Forbidden("admin privileges required".to_string()));
        }
        Ok(Self(principal))
    }
}
