//! Application configuration loaded from environment variables.

use payments::{DEFAULT_PROVIDER_TIMEOUT, DEFAULT_TOLERANCE_SECS};

/// Log output format, selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration.
///
/// | variable | default |
/// |---|---|
/// | `HOST` | `0.0.0.0` |
/// | `PORT` | `3000` |
/// | `RUST_LOG` | `info` |
/// | `LOG_FORMAT` | `pretty` (`json` for structured output) |
/// | `DATABASE_URL` | unset: in-memory event store |
/// | `CLIENT_URL` | `http://localhost:5173` |
/// | `PAYMENT_API_BASE` | `https://api.stripe.com` |
/// | `PAYMENT_SECRET_KEY` | unset: in-memory payment provider |
/// | `PAYMENT_TIMEOUT_SECS` | `10` |
/// | `WEBHOOK_SECRET` | unset: a random secret, so no notification verifies |
/// | `WEBHOOK_TOLERANCE_SECS` | `300` |
/// | `CHECKOUT_CURRENCY` | `inr` |
/// | `OPERATOR_TOKEN` | unset: reconciliation endpoints refuse every caller |
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub client_url: String,
    pub payment_api_base: String,
    pub payment_secret_key: Option<String>,
    pub payment_timeout_secs: u64,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub checkout_currency: String,
    pub operator_token: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("database", &self.database_url.is_some())
            .field("client_url", &self.client_url)
            .field("payment_api_base", &self.payment_api_base)
            .field("hosted_payments", &self.payment_secret_key.is_some())
            .field("payment_timeout_secs", &self.payment_timeout_secs)
            .field("webhook_secret", &self.webhook_secret.is_some())
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("checkout_currency", &self.checkout_currency)
            .field("operator_token", &self.operator_token.is_some())
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: var("DATABASE_URL"),
            client_url: var("CLIENT_URL").unwrap_or(defaults.client_url),
            payment_api_base: var("PAYMENT_API_BASE").unwrap_or(defaults.payment_api_base),
            payment_secret_key: var("PAYMENT_SECRET_KEY"),
            payment_timeout_secs: var("PAYMENT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|s: &u64| *s > 0)
                .unwrap_or(defaults.payment_timeout_secs),
            webhook_secret: var("WEBHOOK_SECRET"),
            webhook_tolerance_secs: var("WEBHOOK_TOLERANCE_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|s: &i64| *s > 0)
                .unwrap_or(defaults.webhook_tolerance_secs),
            checkout_currency: var("CHECKOUT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.checkout_currency),
            operator_token: var("OPERATOR_TOKEN"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            client_url: "http://localhost:5173".to_string(),
            payment_api_base: "https://api.stripe.com".to_string(),
            payment_secret_key: None,
            payment_timeout_secs: DEFAULT_PROVIDER_TIMEOUT.as_secs(),
            webhook_secret: None,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            checkout_currency: "inr".to_string(),
            operator_token: None,
        }
    }
}
