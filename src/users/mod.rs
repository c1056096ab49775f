//! Accounts.
//!
//! A user row doubles as a WebFinger resource: its `subject` is `acct:{username}@{domain}`
//! where `domain` is the host part of the registration email.

pub mod password;

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Display};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// PHC string. `None` for resource-only rows that cannot log in.
    pub password_hash: Option<String>,
    pub domain: String,
    pub subject: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("subject", &self.subject)
            .field("is_admin", &self.is_admin)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub domain: String,
    pub subject: String,
    pub is_admin: bool,
}

impl NewUser {
    /// Derive domain and subject from the email. Returns `None` if the email has no host.
    #[must_use]
    pub fn new(username: &str, email: &str, password_hash: String) -> Option<Self> {
        let (_, domain) = email.rsplit_once('@')?;
        if domain.is_empty() {
            return None;
        }
        let domain = domain.to_ascii_lowercase();
        Some(Self {
            subject: format!("acct:{username}@{domain}"),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            domain,
            is_admin: false,
        })
    }

    #[must_use]
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub admins: i64,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username or email already registered")]
    Conflict,
    #[error("user store {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl UserStoreError {
    pub(crate) fn backend(operation: &'static str, err: impl Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// # Errors
    ///
    /// [`UserStoreError::Conflict`] if the username, email or subject is taken.
    async fn create(&self, user: &NewUser) -> Result<User, UserStoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError>;

    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError>;

    async fn touch_last_login(&self, id: i64) -> Result<(), UserStoreError>;

    async fn counts(&self) -> Result<UserCounts, UserStoreError>;
}
