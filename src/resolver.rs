//! Cache-aside resolution of resource records and subject searches.
//!
//! The cache is consulted first and never fails a lookup: backend errors are logged and
//! treated as a miss. An authoritative miss is not cached, so a resource created later is
//! visible immediately. Searches differ on purpose: an empty result set is cached as a
//! sentinel with a shorter TTL.

use crate::{
    cache::{CacheConfig, CacheError, CacheStats, ResourceCache, SearchLookup},
    metrics::Metrics,
    resource::{Jrd, ResourceKey, ResourceStore, StoreError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

pub const MIN_QUERY_LEN: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    #[must_use]
    pub fn as_header_value(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub record: Jrd,
    pub cache: CacheStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<String>,
    pub cache: CacheStatus,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resource not found")]
    NotFound,
    #[error("query must be at least {MIN_QUERY_LEN} characters")]
    QueryTooShort,
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn cache_span(operation: &'static str, key: &str) -> tracing::Span {
    info_span!("cache.op", cache.operation = operation, cache.key = key)
}

/// Lowercased, trimmed form used for both the store query and the cache key.
#[must_use]
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub struct ResourceResolver {
    cache: Arc<dyn ResourceCache>,
    store: Arc<dyn ResourceStore>,
    config: CacheConfig,
    metrics: Arc<Metrics>,
}

impl ResourceResolver {
    #[must_use]
    pub fn new(
        cache: Arc<dyn ResourceCache>,
        store: Arc<dyn ResourceStore>,
        config: CacheConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cache,
            store,
            config,
            metrics,
        }
    }

    /// # Errors
    ///
    /// [`ResolveError::NotFound`] on an authoritative miss, [`ResolveError::Store`] if the
    /// authoritative store fails.
    pub async fn resolve(&self, key: &ResourceKey) -> Result<Resolved, ResolveError> {
        let cache_key = self.config.keys().record(key);

        match self
            .cache
            .get(&cache_key)
            .instrument(cache_span("get", &cache_key))
            .await
        {
            Ok(Some(record)) => {
                self.metrics.record_cache_hit();
                return Ok(Resolved {
                    record,
                    cache: CacheStatus::Hit,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(key = %cache_key, "cache read failed, using store: {err}"),
        }
        self.metrics.record_cache_miss();

        let Some(record) = self.store.lookup(key).await? else {
            debug!(resource = %key, "resource not found");
            return Err(ResolveError::NotFound);
        };

        if let Err(err) = self
            .cache
            .set(&cache_key, &record, self.config.record_ttl())
            .instrument(cache_span("set", &cache_key))
            .await
        {
            warn!(key = %cache_key, "cache populate failed: {err}");
        }

        Ok(Resolved {
            record,
            cache: CacheStatus::Miss,
        })
    }

    /// # Errors
    ///
    /// [`ResolveError::QueryTooShort`] for queries under [`MIN_QUERY_LEN`] characters,
    /// [`ResolveError::Store`] if the authoritative store fails.
    pub async fn search(&self, raw_query: &str) -> Result<SearchOutcome, ResolveError> {
        let query = normalize_query(raw_query);
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(ResolveError::QueryTooShort);
        }
        let cache_key = self.config.keys().search(&query);

        let cached = self
            .cache
            .get_search(&cache_key)
            .instrument(cache_span("get_search", &cache_key))
            .await
            .unwrap_or_else(|err| {
                warn!(key = %cache_key, "search cache read failed, using store: {err}");
                SearchLookup::Miss
            });

        match cached {
            SearchLookup::Results(results) => {
                self.metrics.record_cache_hit();
                return Ok(SearchOutcome {
                    query,
                    results,
                    cache: CacheStatus::Hit,
                });
            }
            SearchLookup::Empty => {
                self.metrics.record_cache_hit();
                return Ok(SearchOutcome {
                    query,
                    results: Vec::new(),
                    cache: CacheStatus::Hit,
                });
            }
            SearchLookup::Miss => self.metrics.record_cache_miss(),
        }

        let results = self.store.search(&query).await?;
        let ttl = if results.is_empty() {
            self.config.search_empty_ttl()
        } else {
            self.config.search_ttl()
        };
        if let Err(err) = self
            .cache
            .set_search(&cache_key, &results, ttl)
            .instrument(cache_span("set_search", &cache_key))
            .await
        {
            warn!(key = %cache_key, "search cache populate failed: {err}");
        }

        Ok(SearchOutcome {
            query,
            results,
            cache: CacheStatus::Miss,
        })
    }

    /// Drop the cached record for `key` and every cached search.
    ///
    /// # Errors
    ///
    /// Returns the cache error; explicit invalidation is not best-effort.
    pub async fn invalidate(&self, key: &ResourceKey) -> Result<(), CacheError> {
        let cache_key = self.config.keys().record(key);
        self.cache
            .invalidate(&cache_key)
            .instrument(cache_span("invalidate", &cache_key))
            .await?;
        self.invalidate_searches().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the cache error.
    pub async fn invalidate_searches(&self) -> Result<usize, CacheError> {
        let prefix = self.config.keys().search_prefix();
        self.cache
            .invalidate_search()
            .instrument(cache_span("invalidate_search", &prefix))
            .await
    }

    /// # Errors
    ///
    /// Returns the cache error.
    pub async fn purge_empty_markers(&self) -> Result<usize, CacheError> {
        let prefix = self.config.keys().search_prefix();
        self.cache
            .purge_empty_markers()
            .instrument(cache_span("purge_empty_markers", &prefix))
            .await
    }

    /// # Errors
    ///
    /// Returns the cache error.
    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats().await
    }

    /// # Errors
    ///
    /// Returns the store error.
    pub async fn ping_store(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}
