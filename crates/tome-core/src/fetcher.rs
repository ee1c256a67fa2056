//! HTTP client for sitemap fetches and reachability checks.
//!
//! Reachability classification is strict: only an actual 404/410 response
//! counts as gone, a 2xx counts as healthy, and everything else (including
//! timeouts and connection failures) is [`UrlStatus::Unknown`]. A URL we
//! could not reach is a different fact than a URL the server says is gone,
//! and the two must never be folded together.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use futures::{StreamExt, stream};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{Config, Error, Result};

/// Reachability of one URL, classified strictly by HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    /// The server answered with a 2xx status.
    Healthy,
    /// The server answered 404 or 410: the resource is confirmed gone.
    Gone,
    /// Any other status, or a transport failure (timeout, DNS, refused
    /// connection). Not evidence of staleness.
    Unknown,
}

impl UrlStatus {
    /// Classify an HTTP status code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Healthy,
            404 | 410 => Self::Gone,
            _ => Self::Unknown,
        }
    }

    /// True only for a confirmed 404/410.
    #[must_use]
    pub const fn is_gone(self) -> bool {
        matches!(self, Self::Gone)
    }
}

/// HTTP client with a configured timeout and bounded batch checking.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with the configured request timeout.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(config.timeout())
    }

    /// Creates a fetcher with an explicit timeout (primarily for tests).
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tome/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Fetches a URL's body as text, failing on non-success statuses.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        info!(url = %url, bytes = body.len(), "fetched");
        Ok(body)
    }

    /// HEAD-checks one URL and classifies the outcome.
    ///
    /// Transport failures resolve to [`UrlStatus::Unknown`] rather than an
    /// error; one unreachable host must not abort a batch.
    pub async fn head_status(&self, url: &str) -> UrlStatus {
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = UrlStatus::from_code(response.status().as_u16());
                debug!(url = %url, code = response.status().as_u16(), ?status, "HEAD check");
                status
            },
            Err(err) => {
                debug!(url = %url, error = %err, "HEAD check unreachable");
                UrlStatus::Unknown
            },
        }
    }

    /// HEAD-checks a batch of URLs with at most `max_workers` in flight.
    ///
    /// Results are keyed by URL; completion order does not matter and there
    /// is no cross-request cancellation, so one failing check never aborts
    /// the others.
    pub async fn check_urls<I>(&self, urls: I, max_workers: usize) -> BTreeMap<String, UrlStatus>
    where
        I: IntoIterator<Item = String>,
    {
        let checks = urls.into_iter().map(|url| async move {
            let status = self.head_status(&url).await;
            (url, status)
        });

        stream::iter(checks)
            .buffer_unordered(max_workers.max(1))
            .collect()
            .await
    }
}

/// Base64-encoded SHA-256 of `content`, the format stored in
/// `IndexEntry::content_hash`.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    STANDARD.encode(hasher.finalize())
}
