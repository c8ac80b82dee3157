//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::TransitionPolicy;
use saga::RetryPolicy;

/// Log output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default `10`)
/// - `JWT_SECRET`: HS256 signing secret; required, the server refuses to
///   start without one
/// - `STATUS_POLICY`: `permissive` or `strict` (default `permissive`)
/// - `RETRY_MAX_ATTEMPTS`: attempts per unit of work on conflict (default `3`)
/// - `RETRY_BACKOFF_MS`: linear backoff step (default `25`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub status_policy: TransitionPolicy,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let status_policy = match lookup("STATUS_POLICY") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(%value, "unknown STATUS_POLICY, using permissive");
                TransitionPolicy::Permissive
            }),
            None => defaults.status_policy,
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: lookup("JWT_SECRET").filter(|secret| !secret.trim().is_empty()),
            status_policy,
            retry_max_attempts: parsed(&lookup, "RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry_max_attempts),
            retry_backoff_ms: parsed(&lookup, "RETRY_BACKOFF_MS")
                .unwrap_or(defaults.retry_backoff_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: None,
            status_policy: TransitionPolicy::Permissive,
            retry_max_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.status_policy, TransitionPolicy::Permissive);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_backoff_ms, 25);
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("STATUS_POLICY", "strict"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_BACKOFF_MS", "100"),
            ("JWT_SECRET", "s3cret"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 25);
        assert_eq!(config.retry_backoff_ms, 100);
        assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.status_policy, TransitionPolicy::Strict);
        assert_eq!(config.retry_max_attempts, 5);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = load(&[
            ("PORT", "eighty"),
            ("STATUS_POLICY", "lenient"),
            ("DATABASE_URL", "  "),
            ("JWT_SECRET", " "),
            ("RETRY_BACKOFF_MS", "-1"),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.retry_backoff_ms, 25);
        assert_eq!(config.status_policy, TransitionPolicy::Permissive);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
