//! Tower middleware enforcing a [`Policy`] on the wrapped service.

use axum::http::Request;
use axum::response::Response;
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;
use tracing::warn;

use super::response::too_many_requests;
use crate::ratelimit::{KeyExtractor, Policy, RateLimiter};

const DEFAULT_MESSAGE: &str = "Rate limit exceeded";

/// A layer that rate limits requests under one policy.
pub struct RateLimitLayer<K> {
    limiter: Arc<RateLimiter>,
    policy: Policy,
    key: Arc<K>,
    message: Arc<str>,
}

impl<K> RateLimitLayer<K> {
    /// Create a new rate limit layer.
    pub fn new(limiter: Arc<RateLimiter>, policy: Policy, key: K) -> Self {
        Self {
            limiter,
            policy,
            key: Arc::new(key),
            message: Arc::from(DEFAULT_MESSAGE),
        }
    }

    /// Set the message reported in the 429 body.
    pub fn with_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.message = message.into();
        self
    }
}

impl<K> Clone for RateLimitLayer<K> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            policy: self.policy.clone(),
            key: Arc::clone(&self.key),
            message: Arc::clone(&self.message),
        }
    }
}

impl<S, K> Layer<S> for RateLimitLayer<K> {
    type Service = RateLimitService<S, K>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: Arc::clone(&self.limiter),
            policy: self.policy.clone(),
            key: Arc::clone(&self.key),
            message: Arc::clone(&self.message),
        }
    }
}

/// Middleware service produced by [`RateLimitLayer`].
pub struct RateLimitService<S, K> {
    inner: S,
    limiter: Arc<RateLimiter>,
    policy: Policy,
    key: Arc<K>,
    message: Arc<str>,
}

impl<S: Clone, K> Clone for RateLimitService<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            policy: self.policy.clone(),
            key: Arc::clone(&self.key),
            message: Arc::clone(&self.message),
        }
    }
}

impl<S, K, B> Service<Request<B>> for RateLimitService<S, K>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    K: KeyExtractor<Request<B>> + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let client = self.key.extract(&request);
        let decision = self.limiter.check(&client, &self.policy);

        if !decision.allowed {
            warn!(
                policy = %self.policy.name(),
                client = %client,
                retry_after = ?decision.retry_after,
                "Rejecting request over rate limit"
            );
            let response = too_many_requests(&decision, &self.message);
            return future::ready(Ok(response)).boxed();
        }

        // Use the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        inner.call(request).boxed()
    }
}
