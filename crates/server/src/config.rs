//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIER_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! ## Optional
//! - `ATELIER_HOST` - Bind address (default: 127.0.0.1)
//! - `ATELIER_PORT` - Listen port (default: 3000)
//! - `ATELIER_CACHE_TTL_SECS` - Order snapshot TTL (default: 60)
//! - `ATELIER_CACHE_CAPACITY` - Max cached snapshots (default: 1000)
//! - `ATELIER_NOTIFY_ATTEMPTS` - Delivery attempts per job (default: 3)
//! - `ATELIER_NOTIFY_BACKOFF_SECS` - Base retry delay (default: 5)
//! - `ATELIER_NOTIFY_POLL_SECS` - Queue poll interval (default: 10)
//! - `ATELIER_SMTP_HOST` - SMTP relay; notifications are logged when unset
//! - `ATELIER_SMTP_PORT` - SMTP port (default: 587)
//! - `ATELIER_SMTP_USERNAME` / `ATELIER_SMTP_PASSWORD` - Relay credentials
//! - `ATELIER_SMTP_FROM` - From address for notification mail
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Order snapshot cache configuration
    pub cache: CacheConfig,
    /// Notification queue configuration
    pub notifications: NotificationConfig,
    /// SMTP configuration; `None` means log-only delivery
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Order snapshot cache settings.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long a snapshot stays valid.
    pub ttl: Duration,
    /// Maximum number of cached snapshots.
    pub capacity: u64,
}

/// Notification queue settings.
#[derive(Debug, Clone, Copy)]
pub struct NotificationConfig {
    /// Delivery attempts per job.
    pub attempts: u32,
    /// Base retry delay; attempt n waits `base * 2^(n-1)`.
    pub backoff: Duration,
    /// How often the worker polls for due jobs.
    pub poll_interval: Duration,
}

/// SMTP relay settings for notification delivery.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay hostname.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// Relay username.
    pub smtp_username: String,
    /// Relay password.
    pub smtp_password: SecretString,
    /// From address on outgoing mail.
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ATELIER_DATABASE_URL")?;
        let host = parse_env_or_default("ATELIER_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("ATELIER_PORT", "3000")?;

        let cache = CacheConfig {
            ttl: Duration::from_secs(parse_env_or_default("ATELIER_CACHE_TTL_SECS", "60")?),
            capacity: parse_env_or_default("ATELIER_CACHE_CAPACITY", "1000")?,
        };

        let notifications = NotificationConfig {
            attempts: parse_env_or_default("ATELIER_NOTIFY_ATTEMPTS", "3")?,
            backoff: Duration::from_secs(parse_env_or_default("ATELIER_NOTIFY_BACKOFF_SECS", "5")?),
            poll_interval: Duration::from_secs(parse_env_or_default(
                "ATELIER_NOTIFY_POLL_SECS",
                "10",
            )?),
        };

        let email = EmailConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            cache,
            notifications,
            email,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EmailConfig {
    /// Load SMTP settings; `Ok(None)` when `ATELIER_SMTP_HOST` is unset.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("ATELIER_SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default("ATELIER_SMTP_PORT", "587")?,
            smtp_username: get_required_env("ATELIER_SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("ATELIER_SMTP_PASSWORD")?),
            from_address: get_required_env("ATELIER_SMTP_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default, parsed into its target type.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            cache: CacheConfig {
                ttl: Duration::from_secs(60),
                capacity: 1000,
            },
            notifications: NotificationConfig {
                attempts: 3,
                backoff: Duration::from_secs(5),
                poll_interval: Duration::from_secs(10),
            },
            email: None,
            sentry_dsn: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("super_secret_password"),
            from_address: "noreply@example.com".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password"));
    }
}
