//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string (only for the `postgres` backend)
//! - `STRIPE_SECRET_KEY` - Payment provider secret key
//! - `CLOUDINARY_CLOUD_NAME` - Image host cloud name
//! - `CLOUDINARY_API_KEY` - Image host API key
//! - `CLOUDINARY_API_SECRET` - Image host signing secret
//!
//! ## Optional
//! - `STORE_BACKEND` - `postgres` or `memory` (default: postgres)
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4000)
//! - `PRODUCTS_PER_PAGE` - Search page size (default: 8)
//! - `CACHE_MAX_CAPACITY` - Maximum cached responses (default: 10000)
//! - `CACHE_TTL_SECS` - Cache entry lifetime; unset means entries live until invalidated
//! - `PAYMENT_CURRENCY` - ISO currency for payment intents (default: inr)
//! - `STRIPE_API_BASE` - Payment provider base URL (default: <https://api.stripe.com>)
//! - `CLOUDINARY_API_BASE` - Image host base URL (default: <https://api.cloudinary.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
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

/// Which [`crate::db::Store`] implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub store_backend: StoreBackend,
    /// `PostgreSQL` connection URL (contains password); required for `Postgres`
    pub database_url: Option<SecretString>,
    pub host: IpAddr,
    pub port: u16,
    /// Page size for product search
    pub products_per_page: u32,
    pub cache: CacheConfig,
    pub stripe: StripeConfig,
    pub cloudinary: CloudinaryConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Response cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_capacity: u64,
    /// `None` keeps entries until a write invalidates them.
    pub ttl: Option<Duration>,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub currency: String,
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Image host configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    pub api_base: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// A source of configuration values, keyed by variable name.
trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| (*v).to_owned())
    }
}

impl ApiConfig {
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
        Self::load(&ProcessEnv)
    }

    fn load(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let store_backend: StoreBackend = parse_env(env, "STORE_BACKEND", "postgres")?;
        let database_url = env.var("DATABASE_URL").map(SecretString::from);
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let products_per_page: u32 = parse_env(env, "PRODUCTS_PER_PAGE", "8")?;
        if products_per_page == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PRODUCTS_PER_PAGE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let cache = CacheConfig {
            max_capacity: parse_env(env, "CACHE_MAX_CAPACITY", "10000")?,
            ttl: parse_optional_env::<u64>(env, "CACHE_TTL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            store_backend,
            database_url,
            host: parse_env(env, "API_HOST", "127.0.0.1")?,
            port: parse_env(env, "API_PORT", "4000")?,
            products_per_page,
            cache,
            stripe: StripeConfig::load(env)?,
            cloudinary: CloudinaryConfig::load(env)?,
            sentry_dsn: env.var("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: env.var("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env(env, "SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env(env, "SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn load(env: &impl EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret(env, "STRIPE_SECRET_KEY")?,
            currency: get_env_or_default(env, "PAYMENT_CURRENCY", "inr").to_lowercase(),
            api_base: get_env_or_default(env, "STRIPE_API_BASE", "https://api.stripe.com"),
        })
    }
}

impl CloudinaryConfig {
    fn load(env: &impl EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: get_required_env(env, "CLOUDINARY_CLOUD_NAME")?,
            api_key: get_required_env(env, "CLOUDINARY_API_KEY")?,
            api_secret: get_validated_secret(env, "CLOUDINARY_API_SECRET")?,
            api_base: get_env_or_default(env, "CLOUDINARY_API_BASE", "https://api.cloudinary.com"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    env.var(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &impl EnvSource, key: &str, default: &str) -> String {
    env.var(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(env: &impl EnvSource, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional environment variable.
fn parse_optional_env<T>(env: &impl EnvSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env.var(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy values.
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret(env: &impl EnvSource, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(env, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("STORE_BACKEND", "memory"),
            ("STRIPE_SECRET_KEY", "sk_test_51Hq8zLm2Kd9VxQp7Rt4Wn"),
            ("CLOUDINARY_CLOUD_NAME", "ecom24"),
            ("CLOUDINARY_API_KEY", "483920174650"),
            ("CLOUDINARY_API_SECRET", "Zk3pQ9_vLx72mWcR1tYb8NaEfH"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::load(&base_env()).unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:4000");
        assert_eq!(config.products_per_page, 8);
        assert_eq!(config.cache.max_capacity, 10_000);
        assert_eq!(config.cache.ttl, None);
        assert_eq!(config.stripe.currency, "inr");
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut env = base_env();
        env.insert("STORE_BACKEND", "postgres");
        assert!(matches!(
            ApiConfig::load(&env),
            Err(ConfigError::MissingEnvVar(var)) if var == "DATABASE_URL"
        ));

        env.insert("DATABASE_URL", "postgres://localhost/ecom24");
        let config = ApiConfig::load(&env).unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://localhost/ecom24"
        );
    }

    #[test]
    fn test_cache_ttl_parsed() {
        let mut env = base_env();
        env.insert("CACHE_TTL_SECS", "300");
        let config = ApiConfig::load(&env).unwrap();
        assert_eq!(config.cache.ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut env = base_env();
        env.insert("API_PORT", "eighty");
        assert!(matches!(
            ApiConfig::load(&env),
            Err(ConfigError::InvalidEnvVar(var, _)) if var == "API_PORT"
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut env = base_env();
        env.insert("PRODUCTS_PER_PAGE", "0");
        assert!(ApiConfig::load(&env).is_err());
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let mut env = base_env();
        env.insert("STRIPE_SECRET_KEY", "your-stripe-key");
        assert!(matches!(
            ApiConfig::load(&env),
            Err(ConfigError::InsecureSecret(var, _)) if var == "STRIPE_SECRET_KEY"
        ));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength("Zk3pQ9_vLx72mWcR1tYb8NaEfH", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ApiConfig::load(&base_env()).unwrap();
        let debug = format!("{:?}", config.stripe);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk_test"));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }
}
