//! Per-client rate limiting.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Buckets idle this long are dropped once the table grows past `PRUNE_THRESHOLD`.
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(300);
const PRUNE_THRESHOLD: usize = 10_000;

/// Pluggable rate-limit strategy. Evaluated before any authorization work.
pub trait RateLimiter: Send + Sync {
    /// Returns true if a request from `key` may proceed.
    fn check(&self, key: &str) -> bool;
}

/// Accepts everything. Used when rate limiting is disabled.
#[derive(Debug, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn check(&self, _key: &str) -> bool {
        true
    }
}

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token bucket per client key (normally the peer IP).
pub struct TokenBucketLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rps: f64,
    burst: f64,
}

impl TokenBucketLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rps: requests_per_second as f64,
            burst: burst_size as f64,
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if buckets.len() > PRUNE_THRESHOLD {
            let now = Instant::now();
            buckets.retain(|_, b| now.duration_since(b.last_update) < IDLE_BUCKET_TTL);
        }
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));

        bucket.try_acquire(self.burst, self.rps)
    }
}

/// Build the limiter selected by configuration.
pub fn from_config(config: &RateLimitConfig) -> Box<dyn RateLimiter> {
    if config.enabled {
        tracing::info!(
            requests_per_second = config.requests_per_second,
            burst_size = config.burst_size,
            "Rate limiting enabled"
        );
        Box::new(TokenBucketLimiter::new(
            config.requests_per_second,
            config.burst_size,
        ))
    } else {
        Box::new(Unlimited)
    }
}
