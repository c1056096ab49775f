//! Cache-aside storage for resource records and search results.
//!
//! The cache is advisory: the authoritative store is the only writer of truth, so writes
//! are unconditional overwrites and a payload that fails to decode is treated as a miss
//! and deleted. Search results are stored as bounded lists; a query with no results is
//! stored as the single-element sentinel list [`EMPTY_SENTINEL`] so it is not rescanned.

pub mod keys;

mod memory;

pub use keys::CacheKeys;
pub use memory::MemoryCache;

use crate::resource::Jrd;
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt::Display, time::Duration};
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_RECORD_TTL_SECONDS: u64 = 300;
pub const DEFAULT_SEARCH_TTL_SECONDS: u64 = 300;
pub const DEFAULT_SEARCH_EMPTY_TTL_SECONDS: u64 = 60;
/// Upper bound for any entry TTL, one year.
pub const MAX_TTL_SECONDS: u64 = 31_536_000;
/// Longest cached search result list.
pub const SEARCH_RESULTS_LIMIT: usize = 25;
pub const EMPTY_SENTINEL: &str = "__EMPTY__";

#[derive(Clone, Debug)]
pub struct CacheConfig {
    keys: CacheKeys,
    max_entries: usize,
    record_ttl: Duration,
    search_ttl: Duration,
    search_empty_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: CacheKeys::default(),
            max_entries: DEFAULT_MAX_ENTRIES,
            record_ttl: Duration::from_secs(DEFAULT_RECORD_TTL_SECONDS),
            search_ttl: Duration::from_secs(DEFAULT_SEARCH_TTL_SECONDS),
            search_empty_ttl: Duration::from_secs(DEFAULT_SEARCH_EMPTY_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = CacheKeys::new(prefix);
        self
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_search_ttl(mut self, ttl: Duration) -> Self {
        self.search_ttl = ttl;
        self
    }

    /// Freshness of the empty-result sentinel, capped at the positive search TTL.
    #[must_use]
    pub fn with_search_empty_ttl(mut self, ttl: Duration) -> Self {
        self.search_empty_ttl = ttl;
        self
    }

    #[must_use]
    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub fn record_ttl(&self) -> Duration {
        self.record_ttl
    }

    #[must_use]
    pub fn search_ttl(&self) -> Duration {
        self.search_ttl
    }

    #[must_use]
    pub fn search_empty_ttl(&self) -> Duration {
        self.search_empty_ttl.min(self.search_ttl)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache {operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
    #[error("failed to encode cache payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(operation: &'static str, err: impl Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

/// Outcome of a search-cache read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchLookup {
    Results(Vec<String>),
    /// The query was seen before and returned nothing.
    Empty,
    Miss,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    pub backend: String,
    pub entries: usize,
    pub search_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// `Ok(None)` is a miss, not an error. Undecodable payloads are deleted and reported
    /// as a miss.
    async fn get(&self, key: &str) -> Result<Option<Jrd>, CacheError>;

    /// Unconditional overwrite.
    async fn set(&self, key: &str, record: &Jrd, ttl: Duration) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;

    async fn get_search(&self, key: &str) -> Result<SearchLookup, CacheError>;

    /// Store up to [`SEARCH_RESULTS_LIMIT`] results, or the sentinel when `results` is empty.
    async fn set_search(
        &self,
        key: &str,
        results: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop every search entry. Returns how many were removed.
    async fn invalidate_search(&self) -> Result<usize, CacheError>;

    /// Drop search entries holding the empty sentinel. Returns how many were removed.
    async fn purge_empty_markers(&self) -> Result<usize, CacheError>;

    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Encode a search result list the way every backend stores it.
pub(crate) fn encode_search(results: &[String]) -> Result<String, CacheError> {
    if results.is_empty() {
        return Ok(serde_json::to_string(&[EMPTY_SENTINEL])?);
    }
    let bounded = &results[..results.len().min(SEARCH_RESULTS_LIMIT)];
    Ok(serde_json::to_string(bounded)?)
}

/// `None` means the payload is corrupt.
pub(crate) fn decode_search(payload: &str) -> Option<SearchLookup> {
    let list: Vec<String> = serde_json::from_str(payload).ok()?;
    match list.as_slice() {
        [only] if only == EMPTY_SENTINEL => Some(SearchLookup::Empty),
        _ => Some(SearchLookup::Results(list)),
    }
}
