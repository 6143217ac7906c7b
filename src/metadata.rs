//! # Movie Metadata Module
//!
//! Looks up a movie by title on OMDb to enrich the rendered page. Lookups
//! are retried with exponential backoff and jitter and guarded by a
//! [`CircuitBreaker`].

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;

/// What we keep from a metadata lookup. Absent values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub title: Option<String>,
    pub year: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub imdb_rating: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("service rejected the request: {0}")]
    Api(String),
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("metadata service unavailable (circuit open)")]
    CircuitOpen,
}

impl MetadataError {
    /// Transport failures are worth another attempt, answers are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, MetadataError::Http(_) | MetadataError::Timeout(_))
    }
}

/// Source of movie metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` when the service has no match for `title`
    async fn lookup(&self, title: &str) -> Result<Option<MovieMetadata>, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}

/// Parse an OMDb JSON body
pub fn parse_omdb(body: &str) -> Result<Option<MovieMetadata>, MetadataError> {
    let response: OmdbResponse =
        serde_json::from_str(body).map_err(|e| MetadataError::Parse(e.to_string()))?;

    if !response.response.eq_ignore_ascii_case("true") {
        let error = response.error.unwrap_or_default();
        if error.to_lowercase().contains("not found") {
            return Ok(None);
        }
        return Err(MetadataError::Api(error));
    }

    Ok(Some(MovieMetadata {
        title: present(response.title),
        year: present(response.year),
        plot: present(response.plot),
        poster: present(response.poster),
        genre: present(response.genre),
        director: present(response.director),
        imdb_rating: present(response.imdb_rating),
    }))
}

/// Delay before retry number `attempt` (0-based): exponential, capped, plus jitter
pub fn retry_delay(config: &RecoveryConfig, attempt: u32) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exponential.min(config.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=config.base_retry_delay_ms / 2);
    Duration::from_millis(capped.saturating_add(jitter))
}

/// OMDb client
pub struct OmdbClient {
    client: Client,
    api_key: String,
    base_url: Url,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl OmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: Url, recovery: RecoveryConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url,
            breaker: CircuitBreaker::new(recovery.clone()),
            recovery,
        }
    }

    async fn fetch_once(&self, title: &str) -> Result<Option<MovieMetadata>, MetadataError> {
        let limit = self.recovery.operation_timeout_secs;
        let request = self
            .client
            .get(self.base_url.clone())
            .query(&[("apikey", self.api_key.as_str()), ("t", title)]);

        let response = timeout(Duration::from_secs(limit), request.send())
            .await
            .map_err(|_| MetadataError::Timeout(limit))?
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(MetadataError::Http(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(MetadataError::Api(format!("server returned {status}")));
        }

        let body = timeout(Duration::from_secs(limit), response.text())
            .await
            .map_err(|_| MetadataError::Timeout(limit))?
            .map_err(|e| MetadataError::Http(e.to_string()))?;
        parse_omdb(&body)
    }
}

#[async_trait]
impl MetadataProvider for OmdbClient {
    async fn lookup(&self, title: &str) -> Result<Option<MovieMetadata>, MetadataError> {
        if self.breaker.is_open() {
            warn!(title, "Skipping metadata lookup, circuit open");
            return Err(MetadataError::CircuitOpen);
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(title).await {
                Ok(metadata) => {
                    self.breaker.record_success();
                    info!(title, found = metadata.is_some(), "Metadata lookup finished");
                    return Ok(metadata);
                }
                Err(e) if e.is_retryable() && attempt < self.recovery.max_retries => {
                    let delay = retry_delay(&self.recovery, attempt);
                    warn!(title, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Metadata lookup failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    debug!(title, failures = self.breaker.failure_count(), "Recorded metadata failure");
                    return Err(e);
                }
            }
        }
    }
}
