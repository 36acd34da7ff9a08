//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::clock::{Clock, MonotonicClock};
use super::key::Policy;
use super::store::BucketStore;

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Whole tokens left after this check (always 0 on denial)
    pub remaining: u64,
    /// Minimum wait before the next request can succeed, set only on denial
    pub retry_after: Option<Duration>,
    /// Capacity of the policy that produced this decision
    pub limit: u64,
}

/// The per-key token bucket rate limiter.
///
/// This struct is thread-safe and can be shared across multiple tasks. Each
/// instance owns its store, so independent limiters never observe each
/// other's buckets.
#[derive(Debug)]
pub struct RateLimiter {
    store: BucketStore,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter using the monotonic system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Create a rate limiter that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: BucketStore::new(),
            clock,
        }
    }

    /// Check and consume one token for `client_key` under `policy`.
    ///
    /// Refill and consumption happen under the bucket's lock, so concurrent
    /// checks for the same key behave as if run one after another.
    pub fn check(&self, client_key: &str, policy: &Policy) -> Decision {
        let key = policy.key_for(client_key);
        let now = self.clock.now();
        let bucket = self.store.get_or_create(&key, policy.spec(), now);

        let (allowed, remaining, retry_after) = {
            let mut state = bucket.lock();
            if state.try_consume(now) {
                (true, state.remaining(), None)
            } else {
                (false, 0, Some(state.retry_after()))
            }
        };

        trace!(
            key = %key,
            allowed = allowed,
            remaining = remaining,
            "Checked rate limit"
        );

        if !allowed {
            debug!(
                key = %key,
                retry_after = ?retry_after,
                "Rate limit exceeded"
            );
        }

        Decision {
            allowed,
            remaining,
            retry_after,
            limit: policy.spec().capacity(),
        }
    }

    /// Current token count for `client_key` under `policy`, without consuming.
    ///
    /// Returns `None` if the client has no bucket yet.
    pub fn peek(&self, client_key: &str, policy: &Policy) -> Option<f64> {
        let bucket = self.store.get(&policy.key_for(client_key))?;
        let mut state = bucket.lock();
        state.refill(self.clock.now());
        Some(state.tokens())
    }

    /// Remove idle buckets that have refilled to capacity.
    ///
    /// Returns the number of buckets removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let removed = self.store.evict_idle(self.clock.now(), max_idle);
        if removed > 0 {
            info!(
                removed = removed,
                remaining = self.store.len(),
                "Evicted idle token buckets"
            );
        }
        removed
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` on the tokio runtime.
    pub fn spawn_eviction(self: Arc<Self>, interval: Duration, max_idle: Duration) -> JoinHandle<()> {
        info!(
            interval = ?interval,
            max_idle = ?max_idle,
            "Starting idle bucket eviction"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.evict_idle(max_idle);
            }
        })
    }

    /// Clear all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Get the number of active buckets.
    pub fn bucket_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
