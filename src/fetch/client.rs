//! Bounded HTTP fetcher.
//!
//! # Responsibilities
//! - Cap fetches in flight with an admission semaphore
//! - Cap concurrent connections per destination
//! - Enforce a total timeout, a status check and a streamed size ceiling
//! - Own the pooled HTTP session: created lazily, torn down by `close()`

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::FetcherConfig;
use crate::fetch::limits::HostLimiter;
use crate::observability::metrics;

/// Errors returned by the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Timeout fetching URL: {url}")]
    Timeout { url: String },

    #[error("HTTP {status} error for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Content too large (>{limit} bytes) for URL: {url}")]
    PayloadTooLarge { limit: usize, url: String },

    #[error("Error fetching {url}: {message}")]
    Request { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Fetcher is closed")]
    Closed,
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Timeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::PayloadTooLarge { .. } => "too_large",
            FetchError::Request { .. } => "request",
            FetchError::Client(_) => "client",
            FetchError::Closed => "closed",
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Async HTTP client with admission control.
#[derive(Debug)]
pub struct Fetcher {
    config: FetcherConfig,
    admission: Semaphore,
    hosts: HostLimiter,
    session: Mutex<Option<Client>>,
    closed: AtomicBool,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            admission: Semaphore::new(max_concurrent),
            hosts: HostLimiter::new(config.per_host_limit),
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            config,
        }
    }

    /// Download `url` as text. Invalid UTF-8 is replaced, not rejected.
    pub async fn fetch(&self, url: &str) -> FetchResult<String> {
        let body = self.get(url, self.config.max_text_bytes).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Download `url` as raw bytes (images and the like).
    pub async fn fetch_binary(&self, url: &str) -> FetchResult<Bytes> {
        let body = self.get(url, self.config.max_binary_bytes).await?;
        Ok(Bytes::from(body))
    }

    /// Fetch all `urls` concurrently and report each outcome.
    pub async fn fetch_each<S: AsRef<str>>(&self, urls: &[S]) -> Vec<(String, FetchResult<String>)> {
        join_all(urls.iter().map(|url| async move {
            let url = url.as_ref();
            (url.to_string(), self.fetch(url).await)
        }))
        .await
    }

    /// Fetch all `urls` concurrently, keeping only the successes.
    pub async fn fetch_multiple<S: AsRef<str>>(&self, urls: &[S]) -> Vec<(String, String)> {
        self.fetch_each(urls)
            .await
            .into_iter()
            .filter_map(|(url, result)| match result {
                Ok(body) => Some((url, body)),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Dropping failed fetch");
                    None
                }
            })
            .collect()
    }

    /// Stop admitting fetches, wait for in-flight ones, then drop the session.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let total = self.config.max_concurrent.max(1) as u32;
        if let Ok(all) = self.admission.acquire_many(total).await {
            drop(all);
        }
        self.admission.close();

        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = session {
            drop(client);
            // Let peer-side teardown of pooled connections complete.
            tokio::time::sleep(Duration::from_millis(self.config.close_grace_ms)).await;
        }
        tracing::info!("Fetcher closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Total fetch calls made, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches currently holding an admission slot and talking to a server.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest `in_flight` value observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent.max(1)
    }

    /// Destinations with a fetch currently holding or awaiting a host slot.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.tracked_hosts()
    }

    async fn get(&self, url: &str, limit: usize) -> FetchResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // The timeout covers queueing for both slots as well as the transfer.
        let result = match tokio::time::timeout(self.config.timeout(), self.admit_and_download(parsed, limit)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { url: url.to_string() }),
        };

        match &result {
            Ok(body) => {
                tracing::debug!(url = %url, bytes = body.len(), "Fetched");
                metrics::record_fetch("ok");
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Fetch failed");
                metrics::record_fetch(e.kind());
            }
        }
        result
    }

    /// Host slot, then admission slot, then the transfer.
    async fn admit_and_download(&self, url: Url, limit: usize) -> FetchResult<Vec<u8>> {
        if self.is_closed() {
            return Err(FetchError::Closed);
        }
        let _host_slot = self.hosts.acquire(&url).await.map_err(|_| FetchError::Closed)?;
        let _admitted = self.admission.acquire().await.map_err(|_| FetchError::Closed)?;
        if self.is_closed() {
            return Err(FetchError::Closed);
        }
        let client = self.session()?;

        let _flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        tracing::debug!(url = %url, in_flight = self.in_flight(), "Fetching");
        download(&client, url, limit).await
    }

    /// Return the shared session, creating it on first use.
    fn session(&self) -> FetchResult<Client> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = session.as_ref() {
            return Ok(client.clone());
        }
        if self.is_closed() {
            return Err(FetchError::Closed);
        }

        let client = Client::builder()
            .user_agent(self.config.user_agent.clone())
            .pool_max_idle_per_host(self.config.per_host_limit)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        tracing::debug!(
            max_concurrent = self.max_concurrent(),
            per_host_limit = self.config.per_host_limit,
            "HTTP session created"
        );
        *session = Some(client.clone());
        Ok(client)
    }
}

/// Stream the body of `url` into memory, aborting past `limit` bytes.
async fn download(client: &Client, url: Url, limit: usize) -> FetchResult<Vec<u8>> {
    let url_str = url.to_string();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, &url_str))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            url: url_str,
        });
    }

    read_capped(response, limit, &url_str).await
}

/// Read a response body, failing with `PayloadTooLarge` past `limit` bytes.
///
/// `Content-Length` is checked before any byte is read; the running total is
/// checked per chunk.
async fn read_capped(mut response: Response, limit: usize, url: &str) -> FetchResult<Vec<u8>> {
    let too_large = || FetchError::PayloadTooLarge {
        limit,
        url: url.to_string(),
    };
    if response.content_length().is_some_and(|declared| declared > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::from_reqwest(e, url))? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Tracks one fetch in flight for the lifetime of the guard.
struct InFlight<'a> {
    count: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = count.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_fails_before_admission() {
        let fetcher = Fetcher::new(FetcherConfig::default());
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fetcher.peak_in_flight(), 0);
    }

    #[tokio::test]
    async fn closed_fetcher_rejects_new_fetches() {
        let mut config = FetcherConfig::default();
        config.close_grace_ms = 0;
        let fetcher = Fetcher::new(config);
        fetcher.close().await;
        assert!(fetcher.is_closed());

        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Closed));
        // Closing twice is harmless.
        fetcher.close().await;
    }

    #[test]
    fn error_messages_name_the_url() {
        let err = FetchError::HttpStatus {
            status: 404,
            url: "https://example.com/x".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404 error for URL: https://example.com/x");
        assert_eq!(err.kind(), "http_status");
    }
}
