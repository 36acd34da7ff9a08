//! Client identity extraction from HTTP requests.

use axum::extract::ConnectInfo;
use axum::http::Request;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::ratelimit::KeyExtractor;

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

fn default_fallback() -> String {
    "anonymous".to_string()
}

/// Where to read the client identity from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySource {
    /// The client IP address (see [`client_ip`])
    PeerIp,
    /// A request header, with a fixed key when the header is absent
    Header {
        name: String,
        #[serde(default = "default_fallback")]
        fallback: String,
    },
    /// The same key for every request, making the limit global to the route
    Constant { value: String },
}

impl Default for KeySource {
    fn default() -> Self {
        KeySource::PeerIp
    }
}

impl<B> KeyExtractor<Request<B>> for KeySource {
    fn extract(&self, request: &Request<B>) -> String {
        match self {
            KeySource::PeerIp => client_ip(request).unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
            KeySource::Header { name, fallback } => request
                .headers()
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.clone()),
            KeySource::Constant { value } => value.clone(),
        }
    }
}

/// Best-effort client IP.
///
/// Prefers the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer address recorded by axum's `ConnectInfo`.
pub fn client_ip<B>(request: &Request<B>) -> Option<String> {
    let headers = request.headers();

    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(forwarded.to_string());
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(real_ip.to_string());
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_peer_ip_prefers_forwarded_for() {
        let req = request(&[
            ("X-Forwarded-For", "203.0.113.7, 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(KeySource::PeerIp.extract(&req), "203.0.113.7");
    }

    #[test]
    fn test_peer_ip_uses_real_ip() {
        let req = request(&[("X-Real-IP", "198.51.100.2")]);
        assert_eq!(KeySource::PeerIp.extract(&req), "198.51.100.2");
    }

    #[test]
    fn test_peer_ip_uses_connect_info() {
        let mut req = request(&[]);
        let addr: SocketAddr = "192.0.2.10:55000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(KeySource::PeerIp.extract(&req), "192.0.2.10");
    }

    #[test]
    fn test_peer_ip_unknown() {
        assert_eq!(KeySource::PeerIp.extract(&request(&[])), "unknown");
    }

    #[test]
    fn test_header_with_fallback() {
        let source = KeySource::Header {
            name: "X-User-ID".to_string(),
            fallback: "anonymous".to_string(),
        };
        assert_eq!(source.extract(&request(&[("X-User-ID", "user_a")])), "user_a");
        assert_eq!(source.extract(&request(&[])), "anonymous");
        assert_eq!(source.extract(&request(&[("X-User-ID", "  ")])), "anonymous");
    }

    #[test]
    fn test_constant() {
        let source = KeySource::Constant {
            value: "everyone".to_string(),
        };
        assert_eq!(source.extract(&request(&[("X-Real-IP", "1.2.3.4")])), "everyone");
    }

    #[test]
    fn test_key_source_from_yaml() {
        let source: KeySource =
            serde_yaml::from_str("type: header\nname: X-API-Key\n").unwrap();
        assert_eq!(
            source,
            KeySource::Header {
                name: "X-API-Key".to_string(),
                fallback: "anonymous".to_string(),
            }
        );

        let source: KeySource = serde_yaml::from_str("type: peer_ip\n").unwrap();
        assert_eq!(source, KeySource::PeerIp);
    }
}
