//! Page load timing and weight estimate.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use url::Url;

use crate::analysis::HtmlDocument;
use crate::config::PerformanceConfig;
use crate::protocol::PerformanceMetrics;
use crate::tasks::TaskFailure;

/// Time a fresh load of `url` and estimate the weight of what it pulls in.
///
/// Only the first `max_probed_resources` resources are probed with HEAD.
/// A probe that fails counts as `fallback_resource_bytes`; a probe without
/// a Content-Length counts as zero.
pub async fn analyze(
    client: &Client,
    url: &str,
    config: &PerformanceConfig,
) -> Result<PerformanceMetrics, TaskFailure> {
    let page_url = Url::parse(url)?;

    let start = Instant::now();
    let response = client
        .get(page_url.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .send()
        .await?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(TaskFailure::Http(format!("HTTP {}", status.as_u16())));
    }
    let body = response.bytes().await?;
    let load_time = start.elapsed();

    let resources = {
        let html = String::from_utf8_lossy(&body);
        HtmlDocument::parse(&html).resource_urls(&page_url)
    };

    let head_timeout = Duration::from_secs(config.head_timeout_secs);
    let probes = resources
        .iter()
        .take(config.max_probed_resources)
        .map(|resource| resource_size(client, resource, head_timeout, config.fallback_resource_bytes));
    let resource_bytes: u64 = join_all(probes).await.into_iter().sum();

    let html_bytes = body.len() as u64;
    Ok(PerformanceMetrics {
        load_time_ms: load_time.as_millis() as u64,
        total_size_kb: (html_bytes + resource_bytes) / 1024,
        num_requests: 1 + resources.len() as u64,
        html_size_kb: html_bytes / 1024,
        num_resources: resources.len() as u64,
    })
}

async fn resource_size(client: &Client, url: &str, timeout: Duration, fallback: u64) -> u64 {
    match client.head(url).timeout(timeout).send().await {
        // Read the header directly; HEAD bodies are always empty.
        Ok(response) => response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        Err(e) => {
            tracing::debug!(resource = url, error = %e, "Resource probe failed, using estimate");
            fallback
        }
    }
}
