use super::{
    decode_search, encode_search, CacheConfig, CacheError, CacheKeys, CacheStats, ResourceCache,
    SearchLookup, MAX_TTL_SECONDS,
};
use crate::resource::Jrd;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    payload: String,
    expires_at: Instant,
}

/// In-process cache of serialized payloads with lazy expiry and a bounded entry count.
#[derive(Debug)]
pub struct MemoryCache {
    keys: CacheKeys,
    max_entries: usize,
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            keys: config.keys().clone(),
            max_entries: config.max_entries(),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Store a payload as-is, bypassing encoding.
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, key: &str, payload: &str, ttl: Duration) {
        self.store(key, payload.to_string(), ttl).await;
    }

    async fn load(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry) if entry.expires_at > now => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // another writer may have refreshed it in between
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn store(&self, key: &str, payload: String, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.min(Duration::from_secs(MAX_TTL_SECONDS)))
            .unwrap_or(now);
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                let nearest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(key, _)| key.clone());
                if let Some(nearest) = nearest {
                    entries.remove(&nearest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                payload,
                expires_at,
            },
        );
    }

    async fn discard_corrupt(&self, key: &str) {
        debug!(key, "discarding undecodable cache entry");
        self.entries.write().await.remove(key);
        // the read counted a hit for a payload that turned out to be useless
        self.hits.fetch_sub(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl ResourceCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Jrd>, CacheError> {
        let Some(payload) = self.load(key).await else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                self.discard_corrupt(key).await;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, record: &Jrd, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record)?;
        self.store(key, payload, ttl).await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_search(&self, key: &str) -> Result<SearchLookup, CacheError> {
        let Some(payload) = self.load(key).await else {
            return Ok(SearchLookup::Miss);
        };
        match decode_search(&payload) {
            Some(lookup) => Ok(lookup),
            None => {
                self.discard_corrupt(key).await;
                Ok(SearchLookup::Miss)
            }
        }
    }

    async fn set_search(
        &self,
        key: &str,
        results: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = encode_search(results)?;
        self.store(key, payload, ttl).await;
        Ok(())
    }

    async fn invalidate_search(&self) -> Result<usize, CacheError> {
        let prefix = self.keys.search_prefix();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        Ok(before - entries.len())
    }

    async fn purge_empty_markers(&self) -> Result<usize, CacheError> {
        let prefix = self.keys.search_prefix();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, entry| {
            !(key.starts_with(&prefix)
                && decode_search(&entry.payload) == Some(SearchLookup::Empty))
        });
        Ok(before - entries.len())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.read().await;
        Ok(CacheStats {
            backend: "memory".to_string(),
            entries: entries.len(),
            search_entries: entries.keys().filter(|key| self.keys.is_search(key)).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::EMPTY_SENTINEL,
        resource::{Link, ResourceKey},
    };
    use anyhow::Result;

    const TTL: Duration = Duration::from_secs(60);

    fn cache() -> MemoryCache {
        MemoryCache::new(&CacheConfig::new())
    }

    fn record() -> Jrd {
        let mut record = Jrd::new("acct:example@example.com");
        record.links.push(Link {
            rel: "http://webfinger.net/rel/profile-page".to_string(),
            media_type: Some("text/html".to_string()),
            href: Some("http://example.com/profile/example".to_string()),
        });
        record
    }

    fn record_key(keys: &CacheKeys) -> Result<String> {
        Ok(keys.record(&ResourceKey::parse("acct:example@example.com")?))
    }

    #[tokio::test]
    async fn set_then_get_returns_equal_record() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;

        assert_eq!(cache.get(&key).await?, None);
        cache.set(&key, &record(), TTL).await?;
        assert_eq!(cache.get(&key).await?, Some(record()));

        cache.invalidate(&key).await?;
        assert_eq!(cache.get(&key).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn set_overwrites() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;
        cache.set(&key, &Jrd::new("acct:first@example.com"), TTL).await?;
        cache.set(&key, &record(), TTL).await?;
        assert_eq!(cache.get(&key).await?, Some(record()));
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_are_misses_and_removed() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;
        cache.set(&key, &record(), Duration::ZERO).await?;

        assert_eq!(cache.get(&key).await?, None);
        assert!(!cache.contains(&key).await);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_ttl_is_clamped() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;
        cache.set(&key, &record(), Duration::MAX).await?;
        assert_eq!(cache.get(&key).await?, Some(record()));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_miss_and_deleted() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;
        cache.insert_raw(&key, "{definitely not json", TTL).await;

        assert_eq!(cache.get(&key).await?, None);
        assert!(!cache.contains(&key).await);
        assert_eq!(cache.get(&key).await?, None);

        let stats = cache.stats().await?;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
        Ok(())
    }

    #[tokio::test]
    async fn record_payload_under_search_key_self_heals() -> Result<()> {
        let cache = cache();
        let keys = CacheKeys::default();
        let key = keys.search("example");
        cache.insert_raw(&key, r#"{"subject":"acct:a@b.c"}"#, TTL).await;

        assert_eq!(cache.get_search(&key).await?, SearchLookup::Miss);
        assert!(!cache.contains(&key).await);
        Ok(())
    }

    #[tokio::test]
    async fn empty_search_is_cached_as_sentinel() -> Result<()> {
        let cache = cache();
        let keys = CacheKeys::default();
        let empty = keys.search("nobody");
        let found = keys.search("example");

        assert_eq!(cache.get_search(&empty).await?, SearchLookup::Miss);
        cache.set_search(&empty, &[], TTL).await?;
        cache
            .set_search(&found, &["acct:example@example.com".to_string()], TTL)
            .await?;

        assert_eq!(cache.get_search(&empty).await?, SearchLookup::Empty);
        assert_eq!(
            cache.get_search(&found).await?,
            SearchLookup::Results(vec!["acct:example@example.com".to_string()])
        );

        assert_eq!(cache.purge_empty_markers().await?, 1);
        assert_eq!(cache.get_search(&empty).await?, SearchLookup::Miss);
        assert!(cache.contains(&found).await);
        Ok(())
    }

    #[tokio::test]
    async fn sentinel_under_record_namespace_is_not_purged() -> Result<()> {
        let cache = cache();
        let key = record_key(&CacheKeys::default())?;
        cache
            .insert_raw(&key, &serde_json::to_string(&[EMPTY_SENTINEL])?, TTL)
            .await;
        assert_eq!(cache.purge_empty_markers().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_search_keeps_records() -> Result<()> {
        let cache = cache();
        let keys = CacheKeys::default();
        let key = record_key(&keys)?;
        cache.set(&key, &record(), TTL).await?;
        cache.set_search(&keys.search("ex"), &[], TTL).await?;
        cache
            .set_search(&keys.search("exa"), &["acct:example@example.com".to_string()], TTL)
            .await?;

        let stats = cache.stats().await?;
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.search_entries, 2);
        assert_eq!(stats.backend, "memory");

        assert_eq!(cache.invalidate_search().await?, 2);
        assert!(cache.contains(&key).await);
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn full_cache_evicts_expired_then_nearest_expiry() -> Result<()> {
        let cache = MemoryCache::new(&CacheConfig::new().with_max_entries(2));
        cache.set("a", &record(), Duration::ZERO).await?;
        cache.set("b", &record(), Duration::from_secs(10)).await?;
        cache.set("c", &record(), Duration::from_secs(20)).await?;
        assert!(!cache.contains("a").await);
        assert!(cache.contains("b").await);
        assert!(cache.contains("c").await);

        cache.set("d", &record(), Duration::from_secs(30)).await?;
        assert!(!cache.contains("b").await);
        assert!(cache.contains("c").await);
        assert!(cache.contains("d").await);

        // overwriting an existing key never evicts
        cache.set("c", &record(), Duration::from_secs(40)).await?;
        assert_eq!(cache.len().await, 2);
        assert!(cache.contains("d").await);
        Ok(())
    }
}
