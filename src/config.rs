//! # Configuration Module
//!
//! Runtime settings read from the environment (a `.env` file is loaded
//! first by `main`). Every optional setting has a default here.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

use reqwest::Url;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_OMDB_BASE_URL: &str = "https://www.omdbapi.com";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600; // 1 hour
pub const DEFAULT_SESSION_SWEEP_SECS: u64 = 300; // 5 minutes
pub const MAX_SESSION_IDLE_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Recovery configuration for calls to external services
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single attempt in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 10000, // 10 seconds
            operation_timeout_secs: 10,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Movie metadata service settings
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// OMDb API key; lookups are disabled without one
    pub api_key: Option<String>,
    pub base_url: Url,
    pub recovery: RecoveryConfig,
}

/// How conversations are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sessions silent for longer than this are dropped
    pub idle_secs: u64,
    /// How often idle sessions are swept
    pub sweep_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_secs.min(MAX_SESSION_IDLE_SECS) as i64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_secs: DEFAULT_SESSION_IDLE_SECS,
            sweep_secs: DEFAULT_SESSION_SWEEP_SECS,
        }
    }
}

/// Where Telegram updates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSource {
    Polling,
    Webhook { url: Url, address: SocketAddr },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub update_source: UpdateSource,
    pub metadata: MetadataConfig,
    pub sessions: SessionConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let update_source = match get("WEBHOOK_URL") {
            Some(raw) => {
                let url = parse_url("WEBHOOK_URL", &raw)?;
                let port = match get("PORT") {
                    Some(raw) => parse_number::<u16>("PORT", &raw)?,
                    None => DEFAULT_PORT,
                };
                UpdateSource::Webhook {
                    url,
                    address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
                }
            }
            None => UpdateSource::Polling,
        };

        let base_url = match get("OMDB_BASE_URL") {
            Some(raw) => parse_url("OMDB_BASE_URL", &raw)?,
            None => parse_url("OMDB_BASE_URL", DEFAULT_OMDB_BASE_URL)?,
        };

        let mut sessions = SessionConfig::default();
        if let Some(raw) = get("SESSION_IDLE_SECS") {
            sessions.idle_secs = parse_number("SESSION_IDLE_SECS", &raw)?;
        }
        if let Some(raw) = get("SESSION_SWEEP_SECS") {
            sessions.sweep_secs = parse_number("SESSION_SWEEP_SECS", &raw)?;
        }
        if sessions.sweep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_SWEEP_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            bot_token,
            update_source,
            metadata: MetadataConfig {
                api_key: get("OMDB_API_KEY"),
                base_url,
                recovery: RecoveryConfig::default(),
            },
            sessions,
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
