//! Cache key layout: `<prefix>webfinger:<resource-key>` and `<prefix>search:<query>`.

use crate::resource::ResourceKey;

pub const DEFAULT_PREFIX: &str = "fingerd:";

const RECORD_NAMESPACE: &str = "webfinger:";
const SEARCH_NAMESPACE: &str = "search:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CacheKeys {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn record(&self, key: &ResourceKey) -> String {
        format!("{}{RECORD_NAMESPACE}{key}", self.prefix)
    }

    /// `query` must already be normalized.
    #[must_use]
    pub fn search(&self, query: &str) -> String {
        format!("{}{SEARCH_NAMESPACE}{query}", self.prefix)
    }

    #[must_use]
    pub fn record_prefix(&self) -> String {
        format!("{}{RECORD_NAMESPACE}", self.prefix)
    }

    #[must_use]
    pub fn search_prefix(&self) -> String {
        format!("{}{SEARCH_NAMESPACE}", self.prefix)
    }

    #[must_use]
    pub fn is_search(&self, key: &str) -> bool {
        key.starts_with(&self.search_prefix())
    }
}
