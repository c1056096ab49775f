//! Credential issuing and validation.
//!
//! Credentials are stateless HS256 tokens, but liveness is owned by the session ledger:
//! [`TokenService::validate`] checks the signature and time bounds locally, then requires a
//! live session row for the credential hash. Revoking a credential is deleting its row.

pub mod jwt;

mod error;

pub use error::TokenError;

use crate::{
    metrics::Metrics,
    session::{Session, SessionStore},
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_ISSUER: &str = "fingerd";
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 86_400;
pub const MIN_SECRET_LEN: usize = 32;

/// Non-secret token settings. The signing secret is passed separately.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    issuer: String,
    ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Who a credential is issued to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub uid: i64,
    pub username: String,
    pub email: String,
    /// Privilege flag.
    pub adm: bool,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            user_id: self.uid,
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.adm,
        }
    }
}

/// A freshly issued credential together with the claims it carries.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub credential: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

// Keep raw credentials out of logs.
impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("credential", &"<redacted>")
            .field("claims", &self.claims)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lowercase hex SHA-256 of the full credential string.
#[must_use]
pub fn hash_credential(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    format!("{digest:x}")
}

pub struct TokenService {
    secret: SecretString,
    config: TokenConfig,
    sessions: Arc<dyn SessionStore>,
    metrics: Arc<Metrics>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// # Errors
    ///
    /// Returns [`TokenError::WeakSecret`] if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(
        secret: SecretString,
        config: TokenConfig,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, TokenError> {
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret(MIN_SECRET_LEN));
        }
        Ok(Self {
            secret,
            config,
            sessions,
            metrics,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a new credential and register its session.
    ///
    /// The credential is only returned once the session row is written; if persistence
    /// fails the signed string is dropped here.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SigningFailure`] or [`TokenError::Persistence`].
    pub async fn issue(
        &self,
        subject: &TokenSubject,
        origin_address: Option<&str>,
        client_descriptor: Option<&str>,
    ) -> Result<IssuedCredential, TokenError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.ttl)
            .map_err(|_| TokenError::SigningFailure)?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::SigningFailure)?;
        let session_id = Uuid::new_v4();

        let claims = Claims {
            sub: subject.user_id.to_string(),
            uid: subject.user_id,
            username: subject.username.clone(),
            email: subject.email.clone(),
            adm: subject.is_admin,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            jti: session_id.to_string(),
        };

        let credential = jwt::sign_hs256(self.secret.expose_secret().as_bytes(), &claims)
            .map_err(|_| TokenError::SigningFailure)?;

        let session = Session {
            session_id,
            subject_id: subject.user_id,
            credential_hash: hash_credential(&credential),
            expires_at,
            created_at: now,
            last_used_at: now,
            origin_address: origin_address.map(str::to_string),
            client_descriptor: client_descriptor.map(str::to_string),
        };
        self.sessions.create(&session).await?;

        self.metrics.record_session_issued();
        debug!(user_id = subject.user_id, session_id = %session_id, "credential issued");

        Ok(IssuedCredential {
            credential,
            claims,
            expires_at,
        })
    }

    /// Validate signature and claim bounds, then require a live session row.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`], [`TokenError::SignatureInvalid`],
    /// [`TokenError::SessionExpired`], [`TokenError::SessionNotFound`], or
    /// [`TokenError::Persistence`] if the ledger could not be read.
    pub async fn validate(&self, credential: &str) -> Result<Claims, TokenError> {
        let claims = self.verify_local(credential, Utc::now())?;

        match self
            .sessions
            .fetch_live(&hash_credential(credential))
            .await?
        {
            Some(session) if session.subject_id == claims.uid => Ok(claims),
            _ => Err(TokenError::SessionNotFound),
        }
    }

    fn verify_local(&self, credential: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims: Claims =
            jwt::verify_hs256(self.secret.expose_secret().as_bytes(), credential)?;

        let now = now.timestamp();
        if claims.exp <= now {
            return Err(TokenError::SessionExpired);
        }
        if claims.nbf > now || claims.iss != self.config.issuer {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    /// Delete the session for `credential`. Unknown or already revoked credentials are fine.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Persistence`] if the ledger delete fails.
    pub async fn revoke(&self, credential: &str) -> Result<(), TokenError> {
        if self
            .sessions
            .delete(&hash_credential(credential))
            .await?
        {
            self.metrics.record_sessions_revoked(1);
        }
        Ok(())
    }

    /// Delete every session of a subject. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Persistence`] if the ledger delete fails.
    pub async fn revoke_all(&self, subject_id: i64) -> Result<u64, TokenError> {
        let removed = self.sessions.delete_by_subject(subject_id).await?;
        self.metrics.record_sessions_revoked(removed);
        debug!(subject_id, removed, "revoked all sessions");
        Ok(removed)
    }

    /// Exchange a live credential for a new one.
    ///
    /// Revoking the old session is best-effort: a failure there is logged and the old
    /// session is left to expire on its own.
    ///
    /// # Errors
    ///
    /// Returns the validation error for the old credential, or the issue error for the
    /// new one.
    pub async fn refresh(
        &self,
        old_credential: &str,
        origin_address: Option<&str>,
        client_descriptor: Option<&str>,
    ) -> Result<IssuedCredential, TokenError> {
        let claims = self.validate(old_credential).await?;
        let issued = self
            .issue(&claims.subject(), origin_address, client_descriptor)
            .await?;

        if let Err(err) = self.revoke(old_credential).await {
            warn!(
                user_id = claims.uid,
                session_id = %claims.jti,
                "failed to revoke refreshed credential: {err}"
            );
        }

        Ok(issued)
    }

    /// Remove expired session rows.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Persistence`] if the ledger delete fails.
    pub async fn sweep(&self) -> Result<u64, TokenError> {
        Ok(self.sessions.delete_expired().await?)
    }

    /// Live sessions of a subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Persistence`] if the ledger read fails.
    pub async fn sessions(&self, subject_id: i64) -> Result<Vec<Session>, TokenError> {
        Ok(self.sessions.list_by_subject(subject_id).await?)
    }
}
