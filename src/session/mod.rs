//! Session ledger.
//!
//! One row per issued credential, keyed by the credential hash (never the raw token).
//! A row whose `expires_at` has passed is dead even before the sweep removes it, so
//! every read path filters on expiry at query time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Same value as the credential's `jti`.
    pub session_id: Uuid,
    pub subject_id: i64,
    /// Lowercase hex SHA-256 of the full signed credential.
    pub credential_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub origin_address: Option<String>,
    pub client_descriptor: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Persistence failure tagged with the operation that failed.
///
/// Only the outermost message of the backend error is kept.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl SessionStoreError {
    pub(crate) fn backend(operation: &'static str, err: impl Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Backend { operation, .. } => operation,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session. A single atomic write.
    async fn create(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Fetch a live session by credential hash and bump its `last_used_at`.
    ///
    /// Expired rows are filtered by the query itself and come back as `None`.
    async fn fetch_live(&self, credential_hash: &str)
        -> Result<Option<Session>, SessionStoreError>;

    /// Delete by credential hash. Returns whether a row was removed.
    async fn delete(&self, credential_hash: &str) -> Result<bool, SessionStoreError>;

    async fn delete_by_subject(&self, subject_id: i64) -> Result<u64, SessionStoreError>;

    async fn delete_expired(&self) -> Result<u64, SessionStoreError>;

    /// Live sessions of a subject, newest first.
    async fn list_by_subject(&self, subject_id: i64) -> Result<Vec<Session>, SessionStoreError>;
}
