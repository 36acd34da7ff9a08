//! The `429 Too Many Requests` response.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;

use crate::ratelimit::Decision;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Build the response sent for a denied decision.
///
/// The body is `{"detail": {"message", "limit", "remaining", "retry_after"}}`
/// and `Retry-After` carries the wait in whole seconds, rounded up.
pub fn too_many_requests(decision: &Decision, message: &str) -> Response {
    let retry_after = decision.retry_after.map(whole_seconds).unwrap_or(1);

    let body = json!({
        "detail": {
            "message": message,
            "limit": decision.limit,
            "remaining": decision.remaining,
            "retry_after": retry_after,
        }
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    response
}

/// Round up to whole seconds, never below one.
fn whole_seconds(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
