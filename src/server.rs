//! HTTP server assembly.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::{RateLimitingConfig, TurnstileConfig};
use crate::error::{Result, TurnstileError};
use crate::http::RateLimitLayer;
use crate::ratelimit::{Policy, RateLimiter};

/// Build the router for the configured routes.
///
/// Every route's rate is validated here, so a bad descriptor fails before
/// the server accepts any traffic. Each route gets its own policy named after
/// its path.
pub fn build_router(config: &RateLimitingConfig, limiter: Arc<RateLimiter>) -> Result<Router> {
    let mut seen = HashSet::new();
    let mut router = Router::new().route("/health", get(|| async { "ok" }));

    for route in &config.routes {
        if !route.path.starts_with('/') || route.path == "/health" {
            return Err(TurnstileError::Config(format!(
                "invalid route path {:?}",
                route.path
            )));
        }
        if !seen.insert(route.path.as_str()) {
            return Err(TurnstileError::Config(format!(
                "duplicate route path {:?}",
                route.path
            )));
        }

        let policy = Policy::from_descriptor(route.path.as_str(), &route.rate)?;
        info!(
            path = %route.path,
            rate = %policy.spec(),
            key = ?route.key,
            "Registering rate limited route"
        );

        let path = route.path.clone();
        let handler = move || {
            let path = path.clone();
            async move { Json(json!({ "message": "Success!", "path": path })) }
        };
        let layer = RateLimitLayer::new(Arc::clone(&limiter), policy, route.key.clone())
            .with_message(route.message.as_str());

        router = router.route(&route.path, get(handler).layer(layer));
    }

    Ok(router)
}

/// HTTP server for the rate limited routes.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The assembled routes
    router: Router,
}

impl HttpServer {
    /// Create a server from configuration, validating every route.
    pub fn from_config(config: &TurnstileConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let router = build_router(&config.rate_limiting, limiter)?;
        Ok(Self {
            addr: config.server.addr,
            router,
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })
    }
}
