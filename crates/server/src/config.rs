//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - `PostgreSQL` connection string, or `memory` for
//!   the in-process store (falls back to `DATABASE_URL`)
//! - `BAZAAR_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 5000)
//! - `BAZAAR_BASE_URL` - Public URL (default: `http://<host>:<port>`)
//! - `BAZAAR_CHECKOUT_SUCCESS_URL` - Redirect after payment (default: `<base>/success`)
//! - `BAZAAR_CHECKOUT_CANCEL_URL` - Redirect on cancel (default: `<base>/cancel`)
//! - `BAZAAR_ACCESS_TOKEN_DAYS` - Access token lifetime (default: 30)
//! - `BAZAAR_REFRESH_TOKEN_DAYS` - Refresh token lifetime (default: 30)
//! - `BAZAAR_LOW_STOCK_THRESHOLD` - Low-stock warning level (default: 2)
//! - `BAZAAR_RATE_LIMIT` - Rate limit auth endpoints (default: true)
//! - `BAZAAR_LOG_FORMAT` - `text` or `json` (default: text)
//! - `STRIPE_API_BASE` - Stripe API URL (default: `https://api.stripe.com`)
//! - `STRIPE_TIMEOUT_SECS` - Stripe request timeout (default: 10)
//! - `STRIPE_WEBHOOK_TOLERANCE_SECS` - Webhook timestamp tolerance (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Database URL value that selects the in-memory store.
pub const MEMORY_STORE_URL: &str = "memory";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where the store keeps its data.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// `PostgreSQL` connection URL (contains password).
    Postgres(SecretString),
    /// Process memory; lost on restart.
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Store server configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Backing store
    pub storage: StorageConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Where the gateway sends the buyer after paying
    pub checkout_success_url: String,
    /// Where the gateway sends the buyer after cancelling
    pub checkout_cancel_url: String,
    /// Token signing and lifetimes
    pub auth: AuthConfig,
    /// Stripe API and webhook configuration
    pub stripe: StripeConfig,
    /// Stock level at or below which warnings are logged
    pub low_stock_threshold: i32,
    /// Whether auth endpoints are rate limited
    pub rate_limit: bool,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Bearer token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,
    /// Lifetime of access tokens
    pub access_token_ttl: chrono::Duration,
    /// Lifetime of refresh tokens
    pub refresh_token_ttl: chrono::Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API secret key
    pub secret_key: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
    /// API base URL
    pub api_base: String,
    /// Request timeout for API calls
    pub timeout: Duration,
    /// Accepted clock skew for webhook signatures, in seconds
    pub webhook_tolerance_secs: u64,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage = get_storage("BAZAAR_DATABASE_URL")?;
        let host: IpAddr = get_parsed_env("BAZAAR_HOST", "127.0.0.1")?;
        let port: u16 = get_parsed_env("BAZAAR_PORT", "5000")?;
        let base_url = validate_url(
            "BAZAAR_BASE_URL",
            get_optional_env("BAZAAR_BASE_URL").unwrap_or_else(|| format!("http://{host}:{port}")),
        )?;
        let base = base_url.trim_end_matches('/');
        let checkout_success_url = validate_url(
            "BAZAAR_CHECKOUT_SUCCESS_URL",
            get_optional_env("BAZAAR_CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|| format!("{base}/success")),
        )?;
        let checkout_cancel_url = validate_url(
            "BAZAAR_CHECKOUT_CANCEL_URL",
            get_optional_env("BAZAAR_CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|| format!("{base}/cancel")),
        )?;

        let jwt_secret = get_validated_secret("BAZAAR_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "BAZAAR_JWT_SECRET")?;
        let auth = AuthConfig {
            jwt_secret,
            access_token_ttl: chrono::Duration::days(get_parsed_env(
                "BAZAAR_ACCESS_TOKEN_DAYS",
                "30",
            )?),
            refresh_token_ttl: chrono::Duration::days(get_parsed_env(
                "BAZAAR_REFRESH_TOKEN_DAYS",
                "30",
            )?),
        };

        let stripe = StripeConfig::from_env()?;

        Ok(Self {
            storage,
            host,
            port,
            base_url,
            checkout_success_url,
            checkout_cancel_url,
            auth,
            stripe,
            low_stock_threshold: get_parsed_env("BAZAAR_LOW_STOCK_THRESHOLD", "2")?,
            rate_limit: get_parsed_env("BAZAAR_RATE_LIMIT", "true")?,
            log_format: get_parsed_env("BAZAAR_LOG_FORMAT", "text")?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            api_base: validate_url(
                "STRIPE_API_BASE",
                get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
            )?,
            timeout: Duration::from_secs(get_parsed_env("STRIPE_TIMEOUT_SECS", "10")?),
            webhook_tolerance_secs: get_parsed_env("STRIPE_WEBHOOK_TOLERANCE_SECS", "300")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get the storage backend, falling back to generic `DATABASE_URL`.
fn get_storage(primary_key: &str) -> Result<StorageConfig, ConfigError> {
    let value = std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))?;

    if value.trim().eq_ignore_ascii_case(MEMORY_STORE_URL) {
        Ok(StorageConfig::Memory)
    } else {
        Ok(StorageConfig::Postgres(SecretString::from(value)))
    }
}

/// Require an absolute http(s) URL.
fn validate_url(key: &str, value: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(value)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable parsed into `T`, with a default value.
fn get_parsed_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stripe_config() -> StripeConfig {
        StripeConfig {
            secret_key: SecretString::from("sk_test_9fK2mQ7xL4pZ8rT1"),
            webhook_secret: SecretString::from("whsec_3Hq8Zk1Lm9Rt5Vx2"),
            api_base: "https://api.stripe.com".to_string(),
            timeout: Duration::from_secs(10),
            webhook_tolerance_secs: 300,
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("X", "https://shop.example/success".to_string()).is_ok());
        assert!(validate_url("X", "http://127.0.0.1:5000".to_string()).is_ok());
        assert!(validate_url("X", "shop.example/success".to_string()).is_err());
        assert!(validate_url("X", "ftp://shop.example".to_string()).is_err());
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_length() {
        assert!(validate_jwt_secret(&SecretString::from("short"), "TEST_JWT").is_err());
        assert!(validate_jwt_secret(&SecretString::from("a".repeat(32)), "TEST_JWT").is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" TEXT ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", stripe_config());

        assert!(debug_output.contains("https://api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_9fK2mQ7xL4pZ8rT1"));
        assert!(!debug_output.contains("whsec_3Hq8Zk1Lm9Rt5Vx2"));
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let auth = AuthConfig {
            jwt_secret: SecretString::from("super_private_signing_value"),
            access_token_ttl: chrono::Duration::days(30),
            refresh_token_ttl: chrono::Duration::days(30),
        };
        let debug_output = format!("{auth:?}");
        assert!(!debug_output.contains("super_private_signing_value"));
    }

    #[test]
    fn test_socket_addr() {
        let config = ShopConfig {
            storage: StorageConfig::Memory,
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            checkout_success_url: "http://localhost:5000/success".to_string(),
            checkout_cancel_url: "http://localhost:5000/cancel".to_string(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("x".repeat(32)),
                access_token_ttl: chrono::Duration::days(30),
                refresh_token_ttl: chrono::Duration::days(30),
            },
            stripe: stripe_config(),
            low_stock_threshold: 2,
            rate_limit: false,
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }
}
