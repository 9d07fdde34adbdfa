//! Size- and time-capped HTTP fetching gated by URL safety validation.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::constants::OUTBOUND_USER_AGENT;
use crate::net::url_safety::{self, UrlSafetyError};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("response exceeded {max_bytes} byte limit")]
    TooLarge { max_bytes: u64 },
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("unsafe URL: {0}")]
    Unsafe(#[from] UrlSafetyError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// HTTP fetcher that validates targets before and after redirects and never
/// buffers unbounded input.
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    client: reqwest::Client,
    allow_private_hosts: bool,
}

impl BoundedFetcher {
    /// Build a fetcher with the standard client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(allow_private_hosts: bool) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(OUTBOUND_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            allow_private_hosts,
        })
    }

    /// Fetch a URL as text, enforcing a byte ceiling and wall-clock timeout.
    ///
    /// The URL is validated before connecting, and the response's final URL
    /// is validated again because redirect targets are attacker-influenced.
    /// The timeout covers the whole operation; cancelling the future drops
    /// the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when validation, the network, the size
    /// ceiling, or the timeout fails the fetch.
    pub async fn fetch_text(
        &self,
        url: &str,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        tokio::time::timeout(timeout, self.fetch_inner(url, max_bytes))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }

    async fn fetch_inner(&self, url: &str, max_bytes: u64) -> Result<String, FetchError> {
        let safe = url_safety::validate_with_policy(url, self.allow_private_hosts).await?;

        let mut response = self
            .client
            .get(safe.as_url().clone())
            .send()
            .await?
            .error_for_status()?;

        // The request may have been redirected; re-check where we ended up.
        let final_url = response.url().to_string();
        if let Err(e) = url_safety::validate_with_policy(&final_url, self.allow_private_hosts).await
        {
            warn!(url, final_url, "Redirect landed on unsafe target");
            return Err(FetchError::Unsafe(e));
        }

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(FetchError::TooLarge { max_bytes });
            }
        }

        let mut body = Vec::new();
        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len() as u64;
            if received > max_bytes {
                return Err(FetchError::TooLarge { max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_rejects_private_target() {
        let fetcher = BoundedFetcher::new(false).unwrap();
        let err = fetcher
            .fetch_text("http://127.0.0.1:1/", 1024, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Unsafe(UrlSafetyError::PrivateAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_scheme() {
        let fetcher = BoundedFetcher::new(true).unwrap();
        let err = fetcher
            .fetch_text("ftp://example.com/x", 1024, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Unsafe(UrlSafetyError::UnsupportedScheme(_))
        ));
    }
}
