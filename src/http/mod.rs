//! HTTP attachment for the rate limiter.
//!
//! [`RateLimitLayer`] wraps any axum route or tower service: it extracts the
//! client key from the request, asks the [`RateLimiter`](crate::ratelimit::RateLimiter)
//! for a decision and either forwards the request untouched or answers with
//! `429 Too Many Requests`.

mod key;
mod layer;
mod response;

pub use key::{client_ip, KeySource};
pub use layer::{RateLimitLayer, RateLimitService};
pub use response::{too_many_requests, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
