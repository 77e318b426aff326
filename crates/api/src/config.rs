//! Application configuration loaded from environment variables.

use std::time::Duration;

use store::PostgresOptions;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Converts into store connection options.
    pub fn options(&self) -> PostgresOptions {
        PostgresOptions {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL` PostgreSQL URL; when unset the in-memory store is used
/// - `DATABASE_MAX_CONNECTIONS` pool size (default: `10`)
/// - `DATABASE_ACQUIRE_TIMEOUT_SECS` pool acquire timeout (default: `5`)
/// - `DATABASE_STATEMENT_TIMEOUT_MS` per-statement timeout (default: `5000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        let database = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| DatabaseConfig {
                url,
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                acquire_timeout_secs: parsed(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
                statement_timeout_ms: parsed(&lookup, "DATABASE_STATEMENT_TIMEOUT_MS", 5000),
            });

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT", 3000),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = from_pairs(&[("HOST", "127.0.0.1"), ("PORT", "8080")]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_database_settings() {
        let config = from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "20"),
            ("DATABASE_STATEMENT_TIMEOUT_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]);

        let db = config.database.unwrap();
        assert_eq!(db.url, "postgres://localhost/shop");
        assert_eq!(db.max_connections, 20);
        assert_eq!(db.acquire_timeout_secs, 5);

        let options = db.options();
        assert_eq!(options.statement_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = from_pairs(&[("DATABASE_URL", "  ")]);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_unparseable_port_falls_back() {
        let config = from_pairs(&[("PORT", "http")]);
        assert_eq!(config.port, 3000);
    }
}
