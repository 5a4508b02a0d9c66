//! Message types carried inside frames.

use serde::{Deserialize, Serialize};

/// Request sent from the scraping server to the processing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub url: String,
    /// HTML snapshot, already truncated by the sender.
    #[serde(default)]
    pub html: String,
}

impl ProcessingRequest {
    /// Build a request, cutting `html` to at most `limit` bytes on a char boundary.
    pub fn new(url: impl Into<String>, html: &str, limit: usize) -> Self {
        Self {
            url: url.into(),
            html: truncate_at_char_boundary(html, limit).to_string(),
        }
    }
}

fn truncate_at_char_boundary(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Page load metrics produced by the performance task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub load_time_ms: u64,
    pub total_size_kb: u64,
    pub num_requests: u64,
    pub html_size_kb: u64,
    pub num_resources: u64,
}

/// Reply from the processing server.
///
/// Each field is filled independently; a failed sub-task leaves its field
/// empty while the others are still populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Base64 PNG screenshot.
    pub screenshot: Option<String>,
    pub performance: Option<PerformanceMetrics>,
    /// Base64 JPEG thumbnails.
    #[serde(default)]
    pub thumbnails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    /// An empty result carrying only an error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// True if at least one sub-task produced output.
    pub fn has_output(&self) -> bool {
        self.screenshot.is_some() || self.performance.is_some() || !self.thumbnails.is_empty()
    }
}

/// One unit of heavy work sent to a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeavyTask {
    Screenshot { url: String },
    Performance { url: String },
    Thumbnails { url: String, html: String },
}

impl HeavyTask {
    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            HeavyTask::Screenshot { .. } => "screenshot",
            HeavyTask::Performance { .. } => "performance",
            HeavyTask::Thumbnails { .. } => "thumbnails",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            HeavyTask::Screenshot { url }
            | HeavyTask::Performance { url }
            | HeavyTask::Thumbnails { url, .. } => url,
        }
    }
}

/// Worker process answer to a `HeavyTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Ok { value: serde_json::Value },
    Err { message: String },
}
