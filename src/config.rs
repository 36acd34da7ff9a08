//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::http::KeySource;
use crate::ratelimit::RateDescriptor;

/// Prefix for environment overrides, e.g. `TURNSTILE__SERVER__ADDR`.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Idle bucket eviction
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Rate limited routes
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteLimit>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionConfig::default(),
            routes: default_routes(),
        }
    }
}

/// Idle bucket eviction. Disabled by default, in which case buckets live for
/// the whole process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Minimum idle time before a refilled bucket may be dropped
    #[serde(default = "default_max_idle")]
    pub max_idle_secs: u64,
}

impl EvictionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval(),
            max_idle_secs: default_max_idle(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_idle() -> u64 {
    600
}

/// A rate limit attached to one route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimit {
    /// Route path, also used to scope the route's buckets
    pub path: String,

    /// Allowed rate
    pub rate: RateDescriptor,

    /// How clients are identified
    #[serde(default)]
    pub key: KeySource,

    /// Message reported when a request is rejected
    #[serde(default = "default_message")]
    pub message: String,
}

impl RouteLimit {
    pub fn new(path: &str, rate: RateDescriptor, key: KeySource) -> Self {
        Self {
            path: path.to_string(),
            rate,
            key,
            message: default_message(),
        }
    }
}

fn default_message() -> String {
    "Rate limit exceeded".to_string()
}

fn default_routes() -> Vec<RouteLimit> {
    vec![
        RouteLimit::new("/basic", RateDescriptor::from("5/minute"), KeySource::PeerIp),
        RouteLimit::new(
            "/numeric",
            RateDescriptor::Explicit {
                capacity: 10,
                refill_amount: 5.0,
                refill_period_seconds: 60.0,
            },
            KeySource::PeerIp,
        ),
        RouteLimit::new(
            "/user",
            RateDescriptor::from("20/hour"),
            KeySource::Header {
                name: "X-User-ID".to_string(),
                fallback: "anonymous".to_string(),
            },
        ),
        RouteLimit::new(
            "/api",
            RateDescriptor::from("100/hour"),
            KeySource::Header {
                name: "X-API-Key".to_string(),
                fallback: "no-key".to_string(),
            },
        ),
    ]
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file layered with
    /// `TURNSTILE__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();
        assert_eq!(config.server.addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.logging.level, "info");
        assert!(!config.rate_limiting.eviction.enabled);

        let paths: Vec<&str> = config
            .rate_limiting
            .routes
            .iter()
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(paths, ["/basic", "/numeric", "/user", "/api"]);
        for route in &config.rate_limiting.routes {
            assert!(route.rate.to_spec().is_ok(), "{}", route.path);
        }
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  addr: 0.0.0.0:9000
logging:
  json: true
rate_limiting:
  eviction:
    enabled: true
    max_idle_secs: 30
  routes:
    - path: /login
      rate: 3/minute
      key:
        type: header
        name: X-User-ID
    - path: /burst
      rate:
        capacity: 10
        refill_amount: 1
        refill_period_seconds: 6
      message: Slow down
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.addr.port(), 9000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert!(config.rate_limiting.eviction.enabled);
        assert_eq!(config.rate_limiting.eviction.max_idle(), Duration::from_secs(30));
        assert_eq!(config.rate_limiting.eviction.interval(), Duration::from_secs(60));

        let routes = &config.rate_limiting.routes;
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].rate, RateDescriptor::from("3/minute"));
        assert_eq!(
            routes[0].key,
            KeySource::Header {
                name: "X-User-ID".to_string(),
                fallback: "anonymous".to_string(),
            }
        );
        assert_eq!(routes[0].message, "Rate limit exceeded");
        assert_eq!(routes[1].key, KeySource::PeerIp);
        assert_eq!(routes[1].rate.to_spec().unwrap().capacity(), 10);
        assert_eq!(routes[1].message, "Slow down");
    }

    #[test]
    fn test_parse_yaml_rejects_garbage() {
        assert!(matches!(
            TurnstileConfig::from_yaml("server: [1, 2"),
            Err(TurnstileError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("turnstile-config-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "server:\n  addr: 127.0.0.1:9123").unwrap();
        drop(file);

        let config = TurnstileConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.addr.port(), 9123);
        assert_eq!(config.rate_limiting.routes.len(), 4);
    }

    #[test]
    fn test_load_reads_logging_section_from_file() {
        let path = std::env::temp_dir().join(format!("turnstile-logging-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "logging:\n  level: debug\n  json: true").unwrap();
        drop(file);

        let config = TurnstileConfig::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = TurnstileConfig::from_file("/nonexistent/turnstile.yaml");
        assert!(matches!(result, Err(TurnstileError::Config(_))));
    }
}
