//! Process-local counters.
//!
//! A single [`Metrics`] is built at startup and handed to each component as an
//! `Arc<Metrics>`; nothing reaches it through a global.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::ToSchema;

#[derive(Debug)]
pub struct Metrics {
    started_at: DateTime<Utc>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    webfinger_requests: AtomicU64,
    auth_success: AtomicU64,
    auth_failure: AtomicU64,
    throttled: AtomicU64,
    sessions_issued: AtomicU64,
    sessions_revoked: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub uptime_seconds: i64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub webfinger_requests: u64,
    pub auth_success: u64,
    pub auth_failure: u64,
    pub throttled: u64,
    pub sessions_issued: u64,
    pub sessions_revoked: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            webfinger_requests: AtomicU64::new(0),
            auth_success: AtomicU64::new(0),
            auth_failure: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            sessions_issued: AtomicU64::new(0),
            sessions_revoked: AtomicU64::new(0),
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webfinger_request(&self) {
        self.webfinger_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_attempt(&self, success: bool) {
        if success {
            self.auth_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.auth_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_issued(&self) {
        self.sessions_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sessions_revoked(&self, count: u64) {
        self.sessions_revoked.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            webfinger_requests: self.webfinger_requests.load(Ordering::Relaxed),
            auth_success: self.auth_success.load(Ordering::Relaxed),
            auth_failure: self.auth_failure.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            sessions_issued: self.sessions_issued.load(Ordering::Relaxed),
            sessions_revoked: self.sessions_revoked.load(Ordering::Relaxed),
        }
    }
}
