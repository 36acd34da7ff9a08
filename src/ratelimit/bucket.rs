//! Token bucket state machine.

use std::time::{Duration, Instant};

use super::spec::RateSpec;

/// Slack allowed when comparing against one whole token, so that waiting
/// exactly the advertised retry delay is never undone by float rounding.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token state for a single client under a single policy.
///
/// Not synchronized on its own; the store wraps each bucket in a mutex so
/// refill and consumption always run as one unit.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    spec: RateSpec,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(spec: RateSpec, now: Instant) -> Self {
        Self {
            spec,
            tokens: spec.capacity() as f64,
            last_refill: now,
        }
    }

    /// Add tokens proportional to the time elapsed since the last refill.
    ///
    /// A timestamp earlier than the last refill grants nothing and does not
    /// move the refill mark backwards.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let added = elapsed.as_secs_f64() / self.spec.refill_period().as_secs_f64()
            * self.spec.refill_amount();

        self.tokens = (self.tokens + added).min(self.spec.capacity() as f64);
        self.last_refill = self.last_refill.max(now);
    }

    /// Refill, then take one token if one is available.
    ///
    /// Returns `true` if the request is allowed.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 - TOKEN_EPSILON {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Current (fractional) token count as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Whole tokens left.
    pub fn remaining(&self) -> u64 {
        self.tokens.floor() as u64
    }

    /// Time until at least one whole token is available.
    pub fn retry_after(&self) -> Duration {
        let missing = 1.0 - self.tokens;
        if missing <= TOKEN_EPSILON {
            return Duration::ZERO;
        }
        let secs = missing / self.spec.refill_amount() * self.spec.refill_period().as_secs_f64();
        Duration::from_nanos((secs * 1e9).ceil() as u64)
    }

    /// Whether the bucket is at capacity.
    pub fn is_full(&self) -> bool {
        self.tokens >= self.spec.capacity() as f64
    }

    /// Time since the bucket was last refilled.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }
}
