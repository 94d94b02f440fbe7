//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PROPFEE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PROPFEE_BASE_URL` - Public URL of the dashboard (decides the secure-cookie flag)
//!
//! ## Optional
//! - `PROPFEE_HOST` - Bind address (default: 127.0.0.1)
//! - `PROPFEE_PORT` - Listen port (default: 3000)
//! - `INSIGHT_API_KEY` - Chat-completions API key (unset disables insights)
//! - `INSIGHT_API_URL` - Endpoint (default: `SiliconFlow` chat completions)
//! - `INSIGHT_MODEL` - Model ID (default: deepseek-ai/DeepSeek-V3)
//! - `INSIGHT_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `DASHBOARD_RECONCILE_SECS` - Reconcile interval, 0 disables (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const DEFAULT_INSIGHT_API_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
pub const DEFAULT_INSIGHT_MODEL: &str = "deepseek-ai/DeepSeek-V3";
const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECONCILE_SECS: u64 = 300;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
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

/// Dashboard server configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Insight endpoint configuration
    pub insight: InsightConfig,
    /// How often to reconcile local state with the store (`None` disables)
    pub reconcile_interval: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Chat-completions endpoint configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct InsightConfig {
    /// Bearer token; `None` disables insights
    pub api_key: Option<SecretString>,
    /// Full chat-completions URL
    pub api_url: String,
    /// Model ID
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for InsightConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightConfig")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_INSIGHT_API_URL.to_owned(),
            model: DEFAULT_INSIGHT_MODEL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_INSIGHT_TIMEOUT_SECS),
        }
    }
}

impl InsightConfig {
    /// Load insight configuration from environment.
    ///
    /// A missing key is not an error: insights are then disabled.
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = get_optional_env("INSIGHT_API_KEY").map(SecretString::from);
        let timeout_secs = parse_env("INSIGHT_TIMEOUT_SECS", DEFAULT_INSIGHT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            api_url: get_env_or_default("INSIGHT_API_URL", DEFAULT_INSIGHT_API_URL),
            model: get_env_or_default("INSIGHT_MODEL", DEFAULT_INSIGHT_MODEL),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Problems worth logging that do not stop startup.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        match &self.api_key {
            None => vec!["INSIGHT_API_KEY not set, insights disabled".to_owned()],
            Some(key) => validate_secret_strength(key.expose_secret(), "INSIGHT_API_KEY")
                .err()
                .map(|e| format!("INSIGHT_API_KEY validation warning: {e}"))
                .into_iter()
                .collect(),
        }
    }
}

impl DashboardConfig {
    /// Startup warnings, returned rather than logged because configuration
    /// loads before the tracing subscriber exists.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.insight.warnings()
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

        let database_url = get_database_url("PROPFEE_DATABASE_URL")?;
        let host = get_env_or_default("PROPFEE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PROPFEE_HOST".to_string(), e.to_string()))?;
        let port = parse_env("PROPFEE_PORT", 3000_u16)?;
        let base_url = get_required_env("PROPFEE_BASE_URL")?;
        let insight = InsightConfig::from_env()?;
        let reconcile_secs = parse_env("DASHBOARD_RECONCILE_SECS", DEFAULT_RECONCILE_SECS)?;
        let reconcile_interval = (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            insight,
            reconcile_interval,
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
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
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

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
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
