//! Per-client token-bucket rate limiting.
//!
//! Buckets live in process memory and are rebuilt from empty on restart. Limiting
//! protects capacity, it is not a security boundary.

use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

pub const DEFAULT_RATE_PER_SECOND: f64 = 10.0;
pub const DEFAULT_BURST: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitConfig {
    rate_per_second: f64,
    burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }

    /// Steady refill rate. Non-positive values are clamped to one token per hour.
    #[must_use]
    pub fn with_rate_per_second(mut self, rate: f64) -> Self {
        self.rate_per_second = if rate > 0.0 { rate } else { 1.0 / 3600.0 };
        self
    }

    /// Bucket capacity, at least one.
    #[must_use]
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst.max(1);
        self
    }

    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Time for an empty bucket to fill up again. A bucket idle this long is full, so
    /// dropping it loses nothing.
    #[must_use]
    pub fn refill_window(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.burst) / self.rate_per_second)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    /// Distinct from an auth failure; `retry_after` is when the next token is available.
    Throttled { retry_after: Duration },
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(config.burst),
            last_refill: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        // an earlier `now` than the last refill adds nothing
        let elapsed = now.saturating_duration_since(self.last_refill);
        let capacity = f64::from(config.burst);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * config.rate_per_second).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Take one token from `key`'s bucket as of `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let bucket = self.bucket(key, now);
        let mut bucket = bucket.lock();
        bucket.refill(&self.config, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            // tokens is bounded by burst, a u32
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let remaining = bucket.tokens.floor() as u32;
            RateLimitDecision::Allowed { remaining }
        } else {
            let missing = 1.0 - bucket.tokens;
            RateLimitDecision::Throttled {
                retry_after: Duration::from_secs_f64(missing / self.config.rate_per_second),
            }
        }
    }

    fn bucket(&self, key: &str, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return bucket.clone();
        }
        self.buckets
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(&self.config, now))))
            .clone()
    }

    /// Drop buckets untouched for at least `idle`. Returns how many were removed.
    pub fn prune_idle(&self, now: Instant, idle: Duration) -> usize {
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.lock().last_refill) < idle);
        before - buckets.len()
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.buckets.read().len()
    }
}
