use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,
    /// Trust `X-Forwarded-For` for caller identity. Enable only behind a
    /// proxy that overwrites the header; clients can forge it otherwise,
    /// which would let them rotate past every rate limit.
    pub trust_proxy_headers: bool,

    // Database
    pub database_path: PathBuf,

    // Feed aggregation
    pub feed_urls: Vec<String>,
    pub feed_cache_ttl: Duration,

    // Admin auth
    pub admin_session_secret: String,
    pub admin_password: String,

    // External verification services
    pub recaptcha_secret_key: Option<String>,
    pub recaptcha_verify_url: String,
    pub openai_api_key: Option<String>,
    pub openai_moderation_url: String,

    // Testing escape hatch: permit fetches to loopback/private addresses.
    // Never enable in production.
    pub allow_private_hosts: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            trust_proxy_headers: parse_env_bool("TRUST_PROXY_HEADERS", false)?,

            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/guestbook.sqlite")),

            feed_urls: parse_url_list(&env_or_default("FEED_URLS", "")),
            feed_cache_ttl: Duration::from_secs(parse_env_u64("FEED_CACHE_TTL_SECS", 600)?),

            admin_session_secret: required_env("ADMIN_SESSION_SECRET")?,
            admin_password: required_env("ADMIN_PASSWORD")?,

            recaptcha_secret_key: optional_env("RECAPTCHA_SECRET_KEY"),
            recaptcha_verify_url: env_or_default(
                "RECAPTCHA_VERIFY_URL",
                "https://www.google.com/recaptcha/api/siteverify",
            ),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_moderation_url: env_or_default(
                "OPENAI_MODERATION_URL",
                "https://api.openai.com/v1/moderations",
            ),

            allow_private_hosts: parse_env_bool("ALLOW_PRIVATE_HOSTS", false)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// Secret strength is checked again at every use by the auth and login
    /// paths; this catches misconfiguration at startup instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.admin_session_secret.trim();
        if secret.len() < 32 || secret.to_lowercase().contains("changeme") {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_SESSION_SECRET".to_string(),
                message: "must be a long random string (32+ chars)".to_string(),
            });
        }
        let password = self.admin_password.trim();
        if password.len() < 12 || password.to_lowercase().contains("changeme") {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_PASSWORD".to_string(),
                message: "must be at least 12 characters and not a placeholder".to_string(),
            });
        }
        if self.feed_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "FEED_CACHE_TTL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// A configuration suitable for tests: no external services configured,
    /// private hosts allowed so mock servers on loopback are reachable.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            trust_proxy_headers: false,
            database_path: PathBuf::from(":memory:"),
            feed_urls: Vec::new(),
            feed_cache_ttl: Duration::from_secs(600),
            admin_session_secret: "test-secret-test-secret-test-secret!".to_string(),
            admin_password: "test-password-123".to_string(),
            recaptcha_secret_key: None,
            recaptcha_verify_url: "https://www.google.com/recaptcha/api/siteverify".to_string(),
            openai_api_key: None,
            openai_moderation_url: "https://api.openai.com/v1/moderations".to_string(),
            allow_private_hosts: true,
        }
    }
}

/// Split a comma-separated list of feed URLs, dropping empty segments.
fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
