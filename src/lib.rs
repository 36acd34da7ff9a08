//! Turnstile - Per-client token bucket rate limiting
//!
//! This crate enforces per-client request rates on HTTP services. Each client
//! key owns an independent token bucket per policy; buckets start full, refill
//! continuously and deny requests once empty. The core engine lives in
//! [`ratelimit`], the axum/tower attachment in [`http`].

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod server;
