//! Client identity, policies and store keys.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::spec::{RateDescriptor, RateSpec};
use crate::error::ConfigurationError;

/// Extracts the rate-limited identity from a request.
///
/// Any `Fn(&R) -> String` is an extractor. The returned string is treated as
/// opaque and must be stable for the same logical client.
pub trait KeyExtractor<R>: Send + Sync {
    fn extract(&self, request: &R) -> String;
}

impl<R, F> KeyExtractor<R> for F
where
    F: Fn(&R) -> String + Send + Sync,
{
    fn extract(&self, request: &R) -> String {
        self(request)
    }
}

/// A named rate applied to one protected operation.
///
/// The name scopes buckets: the same client under two policies gets two
/// independent buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    name: Arc<str>,
    spec: RateSpec,
}

impl Policy {
    pub fn new(name: impl Into<Arc<str>>, spec: RateSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Validate a descriptor and bind it to a name.
    pub fn from_descriptor(
        name: impl Into<Arc<str>>,
        descriptor: &RateDescriptor,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::new(name, descriptor.to_spec()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RateSpec {
        &self.spec
    }

    /// Build the store key for a client under this policy.
    pub fn key_for(&self, client: &str) -> StoreKey {
        StoreKey {
            policy: Arc::clone(&self.name),
            rate: RateKey::from(&self.spec),
            client: client.to_string(),
        }
    }
}

/// Hashable identity of a [`RateSpec`].
///
/// Part of the store key so that two policies sharing a name but not a rate
/// never share a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateKey {
    capacity: u64,
    refill_amount_bits: u64,
    refill_period: Duration,
}

impl From<&RateSpec> for RateKey {
    fn from(spec: &RateSpec) -> Self {
        Self {
            capacity: spec.capacity(),
            refill_amount_bits: spec.refill_amount().to_bits(),
            refill_period: spec.refill_period(),
        }
    }
}

/// A key that uniquely identifies a bucket in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// The policy the bucket belongs to
    pub policy: Arc<str>,
    /// The rate the bucket was created for
    pub rate: RateKey,
    /// The client identity returned by the key extractor
    pub client: String,
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.policy, self.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str) -> Policy {
        Policy::new(name, RateSpec::parse("5/minute").unwrap())
    }

    #[test]
    fn test_store_key_creation() {
        let key = policy("/basic").key_for("10.0.0.1");

        assert_eq!(&*key.policy, "/basic");
        assert_eq!(key.client, "10.0.0.1");
        assert_eq!(key.to_string(), "/basic:10.0.0.1");
    }

    #[test]
    fn test_store_key_equality() {
        let p = policy("/basic");
        assert_eq!(p.key_for("a"), p.key_for("a"));
        assert_ne!(p.key_for("a"), p.key_for("b"));
        assert_ne!(p.key_for("a"), policy("/other").key_for("a"));
    }

    #[test]
    fn test_store_key_includes_rate() {
        let slow = Policy::new("/x", RateSpec::parse("1/minute").unwrap());
        let fast = Policy::new("/x", RateSpec::parse("100/minute").unwrap());
        let bursty = Policy::new("/x", RateSpec::from_parts(100, 1.0, 60.0).unwrap());

        assert_ne!(slow.key_for("a"), fast.key_for("a"));
        assert_ne!(fast.key_for("a"), bursty.key_for("a"));
        assert_eq!(fast.key_for("a").to_string(), "/x:a");
    }

    #[test]
    fn test_policy_from_descriptor() {
        let p = Policy::from_descriptor("/numeric", &RateDescriptor::Explicit {
            capacity: 10,
            refill_amount: 5.0,
            refill_period_seconds: 60.0,
        })
        .unwrap();
        assert_eq!(p.name(), "/numeric");
        assert_eq!(p.spec().capacity(), 10);

        assert!(Policy::from_descriptor("/bad", &RateDescriptor::from("0/minute")).is_err());
    }

    #[test]
    fn test_closure_is_key_extractor() {
        struct FakeRequest {
            user: Option<&'static str>,
        }

        let by_user = |req: &FakeRequest| req.user.unwrap_or("anonymous").to_string();

        assert_eq!(by_user.extract(&FakeRequest { user: Some("alice") }), "alice");
        assert_eq!(by_user.extract(&FakeRequest { user: None }), "anonymous");
    }
}
