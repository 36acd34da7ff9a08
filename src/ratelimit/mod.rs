//! Rate limiting logic and state management.

mod bucket;
mod clock;
mod key;
mod limiter;
mod spec;
mod store;

pub use bucket::TokenBucket;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use key::{KeyExtractor, Policy, RateKey, StoreKey};
pub use limiter::{Decision, RateLimiter};
pub use spec::{RateDescriptor, RateSpec, RateUnit};
pub use store::{BucketStore, SharedBucket};
