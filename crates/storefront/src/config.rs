//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GIFTSHOP_API_BASE_URL` - Base URL of the storefront backend API
//!
//! ## Optional
//! - `GIFTSHOP_ENV` - `production` or `development` (default: development)
//! - `GIFTSHOP_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `GIFTSHOP_USER_AGENT` - User agent sent with every request
//! - `SENTRY_DSN` - Sentry error tracking DSN (used by the CLI only)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment environment; decides cookie hardening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether credential cookies carry the `Secure` attribute.
    #[must_use]
    pub const fn secure_cookies(self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" => Ok(Self::Development),
            other => Err(format!("expected 'production' or 'development', got '{other}'")),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL every API path is resolved against
    pub api_base_url: Url,
    /// Deployment environment
    pub environment: Environment,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present. The
    /// base URL is never defaulted: a missing value is a fatal error here,
    /// the first time the client is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or any variable is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(&get_required_env("GIFTSHOP_API_BASE_URL")?)?;
        let environment = get_optional_env("GIFTSHOP_ENV")
            .map(|value| value.parse::<Environment>())
            .transpose()
            .map_err(|e| ConfigError::InvalidEnvVar("GIFTSHOP_ENV".to_string(), e))?
            .unwrap_or_default();
        let timeout_secs = get_env_or_default(
            "GIFTSHOP_REQUEST_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("GIFTSHOP_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let user_agent = get_optional_env("GIFTSHOP_USER_AGENT").unwrap_or_else(default_user_agent);

        Ok(Self {
            api_base_url,
            environment,
            request_timeout: Duration::from_secs(timeout_secs),
            user_agent,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Build a configuration for a known base URL with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url(base_url)?,
            environment: Environment::default(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            sentry_dsn: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn default_user_agent() -> String {
    format!("giftshop-storefront/{}", env!("CARGO_PKG_VERSION"))
}

/// Parse the base URL, insisting on http(s).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("GIFTSHOP_API_BASE_URL".to_string(), reason);

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url() {
        let url = parse_base_url("https://shop.example.com").unwrap();
        assert_eq!(url.host_str(), Some("shop.example.com"));

        assert!(matches!(
            parse_base_url("ftp://shop.example.com"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(" Dev ".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
        assert!(Environment::Production.secure_cookies());
        assert!(!Environment::Development.secure_cookies());
    }

    #[test]
    fn test_for_base_url_defaults() {
        let config = StorefrontConfig::for_base_url("http://localhost:8080").unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.user_agent.starts_with("giftshop-storefront/"));
    }

    #[test]
    fn test_missing_required_env() {
        let result = get_required_env("GIFTSHOP_TEST_DEFINITELY_UNSET_VARIABLE");
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(key)) if key == "GIFTSHOP_TEST_DEFINITELY_UNSET_VARIABLE"));
    }
}
