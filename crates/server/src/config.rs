//! Cart service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All are optional.
//! - `CARTLINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; without either the service keeps carts in memory)
//! - `CARTLINE_HOST` - Bind address (default: 127.0.0.1)
//! - `CARTLINE_PORT` - Listen port (default: 5000)
//! - `CART_MATCH_SCOPE` - `scoped` or `global` (default: scoped)
//! - `CART_SNAPSHOT_POLICY` - `skip`, `best_effort` or `require` (default: require)
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins (default: any origin)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use crate::cart::{MatchScope, SnapshotPolicy};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart service configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct CartlineConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// How quantity updates and removals locate their line
    pub match_scope: MatchScope,
    /// Whether new lines need a catalog entry
    pub snapshot_policy: SnapshotPolicy,
    /// Allowed CORS origins; empty means any origin
    pub cors_allowed_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for CartlineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartlineConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("match_scope", &self.match_scope)
            .field("snapshot_policy", &self.snapshot_policy)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl Default for CartlineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            match_scope: MatchScope::default(),
            snapshot_policy: SnapshotPolicy::default(),
            cors_allowed_origins: Vec::new(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl CartlineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env.database_url("CARTLINE_DATABASE_URL");
        let host = env.parse_or("CARTLINE_HOST", "127.0.0.1")?;
        let port = env.parse_or("CARTLINE_PORT", "5000")?;
        let match_scope = env.parse_or("CART_MATCH_SCOPE", MatchScope::default().as_str())?;
        let snapshot_policy =
            env.parse_or("CART_SNAPSHOT_POLICY", SnapshotPolicy::default().as_str())?;
        let cors_allowed_origins = env
            .optional("CORS_ALLOWED_ORIGINS")
            .map(|list| parse_origins(&list))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            host,
            port,
            match_scope,
            snapshot_policy,
            cors_allowed_origins,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// The database URL, for tools that cannot run without one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no URL is configured.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTLINE_DATABASE_URL".to_owned()))
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse a variable, using `default` when unset.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key).unwrap_or_else(|| default.to_owned());
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    }

    /// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
    fn database_url(&self, primary_key: &str) -> Option<SecretString> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
    }
}

fn parse_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CartlineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        CartlineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.match_scope, MatchScope::Scoped);
        assert_eq!(config.snapshot_policy, SnapshotPolicy::Require);
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_require_database_url() {
        let err = load(&[]).unwrap().require_database_url().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://fallback/db"
        );

        let config = load(&[
            ("DATABASE_URL", "postgres://fallback/db"),
            ("CARTLINE_DATABASE_URL", "postgres://primary/db"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://primary/db"
        );
    }

    #[test]
    fn test_cart_settings() {
        let config = load(&[
            ("CART_MATCH_SCOPE", "global"),
            ("CART_SNAPSHOT_POLICY", "best-effort"),
        ])
        .unwrap();
        assert_eq!(config.match_scope, MatchScope::Global);
        assert_eq!(config.snapshot_policy, SnapshotPolicy::BestEffort);
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("CARTLINE_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CARTLINE_PORT"));

        let err = load(&[("CART_MATCH_SCOPE", "everyone")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CART_MATCH_SCOPE"));
    }

    #[test]
    fn test_cors_origins() {
        let config = load(&[(
            "CORS_ALLOWED_ORIGINS",
            "https://shop.example, ,https://admin.example",
        )])
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://shop.example", "https://admin.example"]
        );

        let config = load(&[("CORS_ALLOWED_ORIGINS", "*")]).unwrap();
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("CARTLINE_DATABASE_URL", "postgres://user:hunter2@db/cart"),
            ("SENTRY_DSN", "https://key@sentry.example/1"),
        ])
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("sentry.example"));
    }
}
