//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `NEOSHOP_API_BASE_URL` - Base URL of the commerce backend REST API
//!
//! ## Optional
//! - `NEOSHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `NEOSHOP_PORT` - Listen port (default: 3000)
//! - `NEOSHOP_BASE_URL` - Public URL of the storefront (default: <http://localhost:3000>)
//! - `NEOSHOP_API_TIMEOUT_SECS` - Backend request timeout (default: 10)
//! - `NEOSHOP_TAX_RATE` - Flat tax rate, e.g. `0.08`
//! - `NEOSHOP_FREE_SHIPPING_THRESHOLD` - Subtotal from which standard shipping is free
//! - `NEOSHOP_LOG_FORMAT` - `pretty` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use neoshop_core::{Money, PricingPolicy};
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for local development.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Commerce backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, always ending in `/` so relative paths join under it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BackendConfig {
    /// Settings for `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse or is
    /// not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        })
    }
}

/// Sentry settings.
///
/// Implements `Debug` manually so the DSN never ends up in logs.
#[derive(Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Commerce backend
    pub backend: BackendConfig,
    /// Shipping, tax and threshold settings
    pub pricing: PricingPolicy,
    /// Log output format
    pub log_format: LogFormat,
    /// Error tracking
    pub sentry: SentryConfig,
}

impl StorefrontConfig {
    /// Defaults for everything except the backend.
    #[must_use]
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend,
            pricing: PricingPolicy::default(),
            log_format: LogFormat::default(),
            sentry: SentryConfig {
                sample_rate: 1.0,
                ..SentryConfig::default()
            },
        }
    }

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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let api_base_url = vars.required("NEOSHOP_API_BASE_URL")?;
        let timeout_secs: u64 =
            vars.parse_or("NEOSHOP_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(invalid("NEOSHOP_API_TIMEOUT_SECS", "must be at least 1"));
        }
        let backend = BackendConfig {
            base_url: parse_base_url(&api_base_url)?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let mut pricing = PricingPolicy::default();
        if let Some(rate) = vars.parse::<Decimal>("NEOSHOP_TAX_RATE")? {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(invalid("NEOSHOP_TAX_RATE", "must be between 0 and 1"));
            }
            pricing.tax_rate = rate;
        }
        if let Some(threshold) = vars.parse::<Money>("NEOSHOP_FREE_SHIPPING_THRESHOLD")? {
            pricing.free_shipping_threshold = threshold;
        }

        let sentry_sample_rate: f32 = vars.parse_or("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate: f32 = vars.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?;
        for (key, rate) in [
            ("SENTRY_SAMPLE_RATE", sentry_sample_rate),
            ("SENTRY_TRACES_SAMPLE_RATE", sentry_traces_sample_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(key, "must be between 0.0 and 1.0"));
            }
        }

        Ok(Self {
            host: vars.parse_or("NEOSHOP_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: vars.parse_or("NEOSHOP_PORT", 3000)?,
            base_url: vars.or_default("NEOSHOP_BASE_URL", "http://localhost:3000"),
            backend,
            pricing,
            log_format: vars.parse_or("NEOSHOP_LOG_FORMAT", LogFormat::Pretty)?,
            sentry: SentryConfig {
                dsn: vars.optional("SENTRY_DSN"),
                environment: vars.optional("SENTRY_ENVIRONMENT"),
                sample_rate: sentry_sample_rate,
                traces_sample_rate: sentry_traces_sample_rate,
            },
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse an optional variable.
    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(key, e)))
            .transpose()
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

/// Parse the backend URL, normalising it to end in `/`.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid("NEOSHOP_API_BASE_URL", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("NEOSHOP_API_BASE_URL", "must be an http(s) URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("NEOSHOP_API_BASE_URL", "https://api.neoshop.dev/v1")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.backend.base_url.as_str(), "https://api.neoshop.dev/v1/");
        assert_eq!(config.backend.timeout, Duration::from_secs(10));
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_secure());
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_missing_backend_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "NEOSHOP_API_BASE_URL"));
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let err = load(&[("NEOSHOP_API_BASE_URL", "ftp://files.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("NEOSHOP_API_BASE_URL", "http://localhost:8080/"),
            ("NEOSHOP_HOST", "0.0.0.0"),
            ("NEOSHOP_PORT", "8000"),
            ("NEOSHOP_BASE_URL", "https://shop.neoshop.dev"),
            ("NEOSHOP_API_TIMEOUT_SECS", "3"),
            ("NEOSHOP_TAX_RATE", "0.2"),
            ("NEOSHOP_FREE_SHIPPING_THRESHOLD", "50.00"),
            ("NEOSHOP_LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8000");
        assert!(config.is_secure());
        assert_eq!(config.backend.timeout, Duration::from_secs(3));
        assert_eq!(config.pricing.tax_rate, Decimal::new(2, 1));
        assert_eq!(config.pricing.free_shipping_threshold, Money::from_cents(5000));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        let base = ("NEOSHOP_API_BASE_URL", "http://localhost:8080");
        assert!(load(&[base, ("NEOSHOP_PORT", "http")]).is_err());
        assert!(load(&[base, ("NEOSHOP_TAX_RATE", "1.5")]).is_err());
        assert!(load(&[base, ("NEOSHOP_API_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[base, ("NEOSHOP_LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[base, ("SENTRY_SAMPLE_RATE", "2")]).is_err());
    }

    #[test]
    fn test_sentry_debug_redacts_dsn() {
        let config = load(&[
            ("NEOSHOP_API_BASE_URL", "http://localhost:8080"),
            ("SENTRY_DSN", "https://super_secret_key@o1.ingest.sentry.io/1"),
            ("SENTRY_ENVIRONMENT", "staging"),
        ])
        .unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("staging"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key"));
    }
}
