//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Parsing itself is a pure function over
//! a key lookup, see [`ServerConfig::from_lookup`].

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is missing or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Secret used to sign access and refresh tokens.
    pub jwt_secret: String,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Deployment environment name (`production` disables the dev reset).
    pub environment: String,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Outbound frame buffer per live session.
    pub session_queue_capacity: usize,

    /// REST request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a
    /// set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(&get, "PORT", 8080)?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let database_url = get("SCALINGO_POSTGRESQL_URL")
            .or_else(|| get("DATABASE_URL"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let environment = get("ENV").unwrap_or_else(|| "development".to_string());

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) if v == "json" => LogFormat::Json,
            Some(value) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value,
                });
            }
        };

        Ok(Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            jwt_secret,
            database_url,
            environment,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            database_min_connections: parse_or(&get, "DATABASE_MIN_CONNECTIONS", 1)?,
            database_connect_timeout_secs: parse_or(&get, "DATABASE_CONNECT_TIMEOUT_SECS", 5)?,
            session_queue_capacity: parse_or(&get, "SESSION_QUEUE_CAPACITY", 256)?,
            request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?,
            log_format,
        })
    }

    /// Returns `true` unless running in production.
    #[must_use]
    pub fn is_development(&self) -> bool {
        !self.environment.eq_ignore_ascii_case("production")
    }

    /// REST request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parses `key` as `T`, returning `default` when unset and an error when
/// set to something unparseable.
fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let Ok(cfg) = load(&[("JWT_SECRET", "s"), ("DATABASE_URL", "postgres://db")]) else {
            panic!("minimal config should load");
        };
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.session_queue_capacity, 256);
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert!(cfg.is_development());
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://db")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "  "), ("DATABASE_URL", "postgres://db")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            load(&[("JWT_SECRET", "s")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn scalingo_url_wins() {
        let Ok(cfg) = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://local"),
            ("SCALINGO_POSTGRESQL_URL", "postgres://hosted"),
        ]) else {
            panic!("config should load");
        };
        assert_eq!(cfg.database_url, "postgres://hosted");
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(matches!(
            load(&[
                ("JWT_SECRET", "s"),
                ("DATABASE_URL", "postgres://db"),
                ("PORT", "eighty")
            ]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
    }

    #[test]
    fn production_disables_dev_mode() {
        let Ok(cfg) = load(&[
            ("JWT_SECRET", "s"),
            ("DATABASE_URL", "postgres://db"),
            ("ENV", "production"),
            ("LOG_FORMAT", "JSON"),
        ]) else {
            panic!("config should load");
        };
        assert!(!cfg.is_development());
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
