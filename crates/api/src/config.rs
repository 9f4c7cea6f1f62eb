//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ANDES_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ANDES_BASE_URL` - Public URL of the API, used for payment callbacks
//! - `ANDES_SESSION_SECRET` - Session signing secret (min 32 chars, randomly generated)
//!
//! ## Optional
//! - `ANDES_HOST` - Bind address (default: 127.0.0.1)
//! - `ANDES_PORT` - Listen port (default: 3000)
//! - `ANDES_RESERVATION_TTL_MINUTES` - How long checkout holds stock (default: 30)
//! - `ANDES_CORS_ORIGINS` - Comma-separated list of allowed browser origins
//! - `ANDES_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (payments - all three or none)
//! - `PAYMENT_GATEWAY_URL` - Gateway API root, e.g. `https://sandbox.flow.cl/api`
//! - `PAYMENT_GATEWAY_API_KEY` - Merchant API key
//! - `PAYMENT_GATEWAY_SECRET` - Merchant signing secret

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const DEFAULT_RESERVATION_TTL_MINUTES: u64 = 30;

/// Values copied from setup docs rather than generated (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &["changeme", "your-", "placeholder"];

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

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// How long a `pending_payment` order holds its stock
    pub reservation_ttl: Duration,
    /// Browser origins allowed by CORS; empty disables the CORS layer
    pub cors_origins: Vec<String>,
    /// Payment gateway; `None` disables the payment routes
    pub payment: Option<PaymentGatewayConfig>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway credentials.
///
/// Implements `Debug` manually to redact the API key and signing secret.
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    /// Gateway API root, without trailing slash
    pub base_url: String,
    /// Merchant API key, sent with every request
    pub api_key: SecretString,
    /// Shared secret for request signatures
    pub secret: SecretString,
}

impl std::fmt::Debug for PaymentGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl PaymentGatewayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let base_url = get_optional_env("PAYMENT_GATEWAY_URL");
        let api_key = get_optional_env("PAYMENT_GATEWAY_API_KEY");
        let secret = get_optional_env("PAYMENT_GATEWAY_SECRET");

        match (base_url, api_key, secret) {
            (Some(url), Some(key), Some(secret)) => {
                validate_url(&url, "PAYMENT_GATEWAY_URL")?;
                Ok(Some(Self {
                    base_url: url.trim_end_matches('/').to_owned(),
                    api_key: SecretString::from(key),
                    secret: SecretString::from(secret),
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PAYMENT_GATEWAY_*".to_string(),
                "PAYMENT_GATEWAY_URL, PAYMENT_GATEWAY_API_KEY and PAYMENT_GATEWAY_SECRET must be set together".to_string(),
            )),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the session secret is short or a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ANDES_DATABASE_URL")?;
        let host = get_env_or_default("ANDES_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ANDES_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ANDES_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ANDES_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("ANDES_BASE_URL")?;
        validate_url(&base_url, "ANDES_BASE_URL")?;
        let session_secret = SecretString::from(get_required_env("ANDES_SESSION_SECRET")?);
        validate_session_secret(&session_secret, "ANDES_SESSION_SECRET")?;

        let ttl_minutes = match get_optional_env("ANDES_RESERVATION_TTL_MINUTES") {
            Some(raw) => parse_ttl_minutes(&raw)?,
            None => DEFAULT_RESERVATION_TTL_MINUTES,
        };

        let cors_origins = get_optional_env("ANDES_CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        let payment = PaymentGatewayConfig::from_env()?;
        let log_json = get_optional_env("ANDES_LOG_JSON").is_some_and(|v| v != "0" && v != "false");
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_owned(),
            session_secret,
            reservation_ttl: Duration::from_secs(ttl_minutes * 60),
            cors_origins,
            payment,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Returns a reference to the payment gateway configuration (if configured).
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentGatewayConfig> {
        self.payment.as_ref()
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn validate_url(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(())
}

fn parse_ttl_minutes(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(minutes) if (1..=24 * 60).contains(&minutes) => Ok(minutes),
        Ok(_) => Err(ConfigError::InvalidEnvVar(
            "ANDES_RESERVATION_TTL_MINUTES".to_string(),
            "must be between 1 and 1440".to_string(),
        )),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "ANDES_RESERVATION_TTL_MINUTES".to_string(),
            e.to_string(),
        )),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// Reject session secrets that are short or copied from a template.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/andes_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("k9$Qz!2vL#8mW@4rT^6yB&1nX*7cF%3h"),
            reservation_ttl: Duration::from_secs(30 * 60),
            cors_origins: Vec::new(),
            payment: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_placeholder() {
        let secret = SecretString::from("your-session-secret-goes-here-1234567");
        let err = validate_session_secret(&secret, "TEST_SESSION").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(err.to_string().contains("your-"));

        let secret = SecretString::from("CHANGEME-CHANGEME-CHANGEME-CHANGEME");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_valid() {
        let config = test_config();
        assert!(validate_session_secret(&config.session_secret, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_parse_ttl_minutes() {
        assert_eq!(parse_ttl_minutes("45").unwrap(), 45);
        assert!(parse_ttl_minutes("0").is_err());
        assert!(parse_ttl_minutes("2000").is_err());
        assert!(parse_ttl_minutes("soon").is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://andes.cl/, http://localhost:5173 ,,"),
            vec!["https://andes.cl", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://api.andes.cl", "X").is_ok());
        assert!(validate_url("ftp://api.andes.cl", "X").is_err());
        assert!(validate_url("not a url", "X").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let config = PaymentGatewayConfig {
            base_url: "https://sandbox.flow.cl/api".to_string(),
            api_key: SecretString::from("merchant-api-key-1234"),
            secret: SecretString::from("super_secret_signing_key"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("sandbox.flow.cl"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("merchant-api-key-1234"));
        assert!(!debug_output.contains("super_secret_signing_key"));
    }
}

#[cfg(test)]
pub(crate) use tests::test_config;
