//! Fixed-window request budgets per client.
//!
//! Each [`ClientKey`] gets `max_requests` per `window`. The window opens on
//! the client's first request and resets once it has fully elapsed. Buckets
//! live in a [`DashMap`], so the check-and-increment for one client happens
//! under that key's shard lock and unrelated clients never contend.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identity used for rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Key shared by every client whose address is not known.
    pub const UNKNOWN: &'static str = "unknown";

    /// First `X-Forwarded-For` entry, else `X-Real-IP`, else [`Self::UNKNOWN`].
    pub fn from_forwarded(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Self {
        let first_forwarded = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = real_ip.map(str::trim).filter(|v| !v.is_empty());
        Self(
            first_forwarded
                .or(real_ip)
                .unwrap_or(Self::UNKNOWN)
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Budget settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    resets_at: Instant,
}

/// Per-client fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    buckets: DashMap<ClientKey, Bucket>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Counts one request for `key`.
    ///
    /// # Errors
    ///
    /// The time until the window resets when the budget is spent.
    pub fn check(&self, key: &ClientKey) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    /// [`Self::check`] against an explicit clock reading.
    pub fn check_at(&self, key: &ClientKey, now: Instant) -> Result<(), Duration> {
        let window = self.config.window;
        let mut bucket = self.buckets.entry(key.clone()).or_insert_with(|| Bucket {
            count: 0,
            resets_at: now + window,
        });

        if bucket.resets_at < now {
            bucket.count = 0;
            bucket.resets_at = now + window;
        }
        if bucket.count >= self.config.max_requests {
            return Err(bucket.resets_at.saturating_duration_since(now));
        }
        bucket.count += 1;
        Ok(())
    }

    /// Drops buckets whose window has elapsed. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.resets_at >= now);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of clients with a live bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Evicts expired buckets once per window until the limiter is dropped.
    pub fn spawn_eviction(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let period = self.config.window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.evict_expired();
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = limiter.tracked_clients(),
                        "rate-limit buckets evicted"
                    );
                }
            }
        })
    }
}
