use super::{Jrd, ResourceKey};
use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;

/// Maximum number of subjects a search returns.
pub const SEARCH_LIMIT: usize = 25;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource store {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn backend(operation: &'static str, err: impl Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

/// Authoritative source of resource records.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Jrd>, StoreError>;

    /// Subjects containing `query` (case-insensitive), ordered, at most [`SEARCH_LIMIT`].
    async fn search(&self, query: &str) -> Result<Vec<String>, StoreError>;

    /// Cheap connectivity check for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
