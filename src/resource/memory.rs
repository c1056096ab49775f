use super::{Jrd, ResourceKey, ResourceStore, SEARCH_LIMIT, StoreError};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::RwLock;

/// In-process resource store keyed by lowercased subject.
#[derive(Debug)]
pub struct MemoryResourceStore {
    records: RwLock<BTreeMap<String, Jrd>>,
    available: AtomicBool,
}

impl Default for MemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub async fn upsert(&self, record: Jrd) {
        self.records
            .write()
            .await
            .insert(record.subject.to_lowercase(), record);
    }

    pub async fn remove(&self, subject: &str) -> bool {
        self.records
            .write()
            .await
            .remove(&subject.to_lowercase())
            .is_some()
    }

    /// Simulate an unreachable backend: every operation fails while unset.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::backend(operation, "store unavailable"))
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn lookup(&self, key: &ResourceKey) -> Result<Option<Jrd>, StoreError> {
        self.ensure_available("lookup")?;
        Ok(self
            .records
            .read()
            .await
            .get(&key.as_str().to_lowercase())
            .cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_available("search")?;
        let needle = query.to_lowercase();
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|(subject, _)| subject.contains(&needle))
            .map(|(_, record)| record.subject.clone())
            .take(SEARCH_LIMIT)
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available("ping")
    }
}
