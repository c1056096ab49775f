//! Identity resources: the JRD model, resource keys and the authoritative store.

mod jrd;
mod memory;
mod postgres;
mod store;

pub use jrd::{CONTENT_TYPE_JRD, Jrd, Link};
pub use memory::MemoryResourceStore;
pub use postgres::PgResourceStore;
pub use store::{ResourceStore, SEARCH_LIMIT, StoreError};

use std::fmt;
use thiserror::Error;

const ACCT_SCHEME: &str = "acct:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceKeyError {
    #[error("resource is empty")]
    Empty,
    #[error("resource must look like acct:user@host")]
    Shape,
}

/// Canonical `acct:local@host` resource key, lowercased as a whole. Stores match subjects
/// case-insensitively, so case variants must share one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// # Errors
    ///
    /// Returns [`ResourceKeyError`] if the input is empty or not `[acct:]local@host`.
    pub fn parse(raw: &str) -> Result<Self, ResourceKeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResourceKeyError::Empty);
        }

        let account = trimmed
            .get(..ACCT_SCHEME.len())
            .filter(|scheme| scheme.eq_ignore_ascii_case(ACCT_SCHEME))
            .map_or(trimmed, |_| &trimmed[ACCT_SCHEME.len()..]);

        if account.chars().any(char::is_whitespace) {
            return Err(ResourceKeyError::Shape);
        }

        let mut parts = account.split('@');
        let (Some(local), Some(host), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ResourceKeyError::Shape);
        };
        if local.is_empty() || host.is_empty() {
            return Err(ResourceKeyError::Shape);
        }

        Ok(Self(format!("{ACCT_SCHEME}{local}@{host}").to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
