//! Source fetching for desktop hosts
//!
//! `http(s)://` identifiers go through reqwest with retry on transient
//! failures; `file://` URLs and plain paths are read with `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    fetch::{AudioFetcher, SourceKind},
};
use bytes::Bytes;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Retry behaviour for remote fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Desktop [`AudioFetcher`].
pub struct DesktopFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl DesktopFetcher {
    /// Fetcher with a 30 second request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("audioviz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_remote(&self, uri: &str) -> Result<Bytes> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.retry.max_attempts.max(1) {
            attempt += 1;
            debug!(attempt, max_attempts = self.retry.max_attempts, "Fetching remote source");

            match self.client.get(uri).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_server_error() || status.as_u16() == 429 {
                        warn!(
                            status = status.as_u16(),
                            attempt,
                            "Remote fetch failed with retryable status"
                        );
                        last_error = Some(BridgeError::fetch(uri, format!("HTTP {}", status)));
                    } else if !status.is_success() {
                        return Err(BridgeError::fetch(uri, format!("HTTP {}", status)));
                    } else {
                        let body = response
                            .bytes()
                            .await
                            .map_err(|e| BridgeError::fetch(uri, e.to_string()))?;

                        if body.is_empty() {
                            return Err(BridgeError::fetch(uri, "empty response body"));
                        }

                        return Ok(body);
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(error = %e, attempt, "Remote fetch failed, will retry");
                    last_error = Some(BridgeError::fetch(uri, e.to_string()));
                }
                Err(e) => return Err(BridgeError::fetch(uri, e.to_string())),
            }

            if attempt < self.retry.max_attempts {
                sleep(self.retry.backoff_for(attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| BridgeError::fetch(uri, "no attempts made")))
    }

    async fn fetch_local(&self, uri: &str) -> Result<Bytes> {
        let path = local_path(uri);
        let data = fs::read(&path)
            .await
            .map_err(|e| BridgeError::fetch(uri, e.to_string()))?;

        if data.is_empty() {
            return Err(BridgeError::fetch(uri, "file is empty"));
        }

        debug!(bytes = data.len(), "Read local source");
        Ok(Bytes::from(data))
    }
}

fn local_path(uri: &str) -> PathBuf {
    let trimmed = uri.trim();
    let stripped = trimmed
        .strip_prefix("file://")
        .or_else(|| trimmed.strip_prefix("FILE://"))
        .unwrap_or(trimmed);
    PathBuf::from(stripped)
}

#[async_trait]
impl AudioFetcher for DesktopFetcher {
    #[instrument(skip(self, uri))]
    async fn fetch(&self, uri: String) -> Result<Bytes> {
        match SourceKind::classify(&uri) {
            SourceKind::Remote => self.fetch_remote(&uri).await,
            SourceKind::LocalFile => self.fetch_local(&uri).await,
        }
    }
}
