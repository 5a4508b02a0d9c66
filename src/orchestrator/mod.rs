//! Front-end scrape orchestration.
//!
//! # Data Flow
//! ```text
//! raw url
//!     → validate (http(s) with a host, else InvalidUrl, no network)
//!     → Fetcher::fetch (HTML)
//!     → analysis::analyze (synchronous)
//!     → client.rs round-trip to the processing server
//!     → ScrapeResult
//! ```

pub mod client;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::analysis::{self, ScrapingData};
use crate::config::ScrapingConfig;
use crate::fetch::Fetcher;
use crate::protocol::{ProcessingRequest, ProcessingResult};

pub use client::{ProcessingClient, ProcessingClientError};

/// Errors that stop a scrape before any network call.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("URL parameter is required")]
    MissingUrl,

    #[error("Invalid URL format")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Error,
}

/// Consolidated report for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    /// RFC 3339 UTC with a `Z` suffix.
    pub timestamp: String,
    pub status: ScrapeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraping_data: Option<ScrapingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_data: Option<ProcessingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScrapeResult {
    pub fn success(url: &str, scraping_data: ScrapingData, processing_data: ProcessingResult) -> Self {
        Self {
            url: url.to_string(),
            timestamp: now(),
            status: ScrapeStatus::Success,
            scraping_data: Some(scraping_data),
            processing_data: Some(processing_data),
            message: None,
        }
    }

    pub fn error(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            timestamp: now(),
            status: ScrapeStatus::Error,
            scraping_data: None,
            processing_data: None,
            message: Some(message.into()),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accept absolute URLs with a scheme and a host.
///
/// Schemes the fetcher cannot speak are left for the fetch to reject.
pub fn validate_url(raw: &str) -> Result<Url, ScrapeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScrapeError::MissingUrl);
    }
    let url = Url::parse(raw).map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ScrapeError::InvalidUrl("missing host".into()));
    }
    Ok(url)
}

/// Runs the fetch, analyze and process pipeline for the HTTP layer.
pub struct Orchestrator {
    fetcher: Arc<Fetcher>,
    processing: ProcessingClient,
    snapshot_limit: usize,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<Fetcher>, processing: ProcessingClient, snapshot_limit: usize) -> Self {
        Self {
            fetcher,
            processing,
            snapshot_limit,
        }
    }

    pub fn from_config(fetcher: Arc<Fetcher>, config: &ScrapingConfig) -> Self {
        Self::new(
            fetcher,
            ProcessingClient::from_config(config),
            config.html_snapshot_limit,
        )
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// Scrape `raw_url`.
    ///
    /// Validation problems are errors. Fetch failures become a result with
    /// `status: error`; back-end failures only fill `processing_data.error`.
    pub async fn scrape(&self, raw_url: &str) -> Result<ScrapeResult, ScrapeError> {
        let url = validate_url(raw_url)?;
        let url_text = raw_url.trim();

        let html = match self.fetcher.fetch(url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Fetch failed");
                return Ok(ScrapeResult::error(url_text, e.to_string()));
            }
        };

        let scraping_data = analysis::analyze(&html, &url);
        tracing::debug!(
            url = %url,
            links = scraping_data.links.len(),
            images = scraping_data.images_count,
            "Page analyzed"
        );

        let request = ProcessingRequest::new(url_text, &html, self.snapshot_limit);
        let processing_data = self.processing.process(&request).await;

        Ok(ScrapeResult::success(url_text, scraping_data, processing_data))
    }
}
