//! Concurrent bucket storage.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::bucket::TokenBucket;
use super::key::StoreKey;
use super::spec::RateSpec;

/// A bucket shared between the store and in-flight checks.
pub type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Process-wide mapping from store key to token bucket.
///
/// The map is sharded, so creating or looking up a bucket only contends with
/// keys in the same shard, and each bucket carries its own mutex for the
/// refill-and-consume step.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<StoreKey, SharedBucket>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bucket for `key`, creating a full one if none exists.
    ///
    /// Concurrent callers racing on a missing key all receive the same bucket.
    pub fn get_or_create(&self, key: &StoreKey, spec: &RateSpec, now: Instant) -> SharedBucket {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.buckets.entry(key.clone()).or_insert_with(|| {
            debug!(
                key = %key,
                capacity = spec.capacity(),
                refill_amount = spec.refill_amount(),
                refill_period = ?spec.refill_period(),
                "Creating new token bucket"
            );
            Arc::new(Mutex::new(TokenBucket::new(*spec, now)))
        });
        Arc::clone(entry.value())
    }

    /// Look up a bucket without creating it.
    pub fn get(&self, key: &StoreKey) -> Option<SharedBucket> {
        self.buckets.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove buckets that are indistinguishable from a fresh one.
    ///
    /// A bucket is removed only when it has been idle for at least `max_idle`,
    /// is back at capacity, and no check currently holds it. Returns the
    /// number of buckets removed.
    pub fn evict_idle(&self, now: Instant, max_idle: Duration) -> usize {
        let mut removed = 0;

        self.buckets.retain(|_, bucket| {
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            let mut state = bucket.lock();
            if state.idle_for(now) < max_idle {
                return true;
            }
            state.refill(now);
            if state.is_full() {
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Number of buckets currently stored.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}
