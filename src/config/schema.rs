//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both
//! servers. All types derive Serde traits for deserialization from config
//! files, and every section has defaults so a minimal (or absent) file works.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration shared by the scraping and processing servers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Front-end HTTP server settings.
    pub scraping: ScrapingConfig,

    /// Back-end dispatcher and worker pool settings.
    pub processing: ProcessingConfig,

    /// Bounded fetcher limits.
    pub fetcher: FetcherConfig,

    /// Heavy task tuning, forwarded to worker processes.
    pub tasks: TaskConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Scraping (front-end) server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Bind address (e.g., "127.0.0.1:8000"). IPv6 literals are accepted.
    pub bind_address: String,

    /// Processing server address as seen by this server.
    pub processing_address: String,

    /// Deadline for one whole `/scrape` request in seconds.
    pub request_timeout_secs: u64,

    /// Connect timeout towards the processing server in seconds.
    pub processing_connect_timeout_secs: u64,

    /// Deadline for the processing round-trip in seconds.
    pub processing_timeout_secs: u64,

    /// Maximum bytes of HTML forwarded to the processing server.
    pub html_snapshot_limit: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            processing_address: "127.0.0.1:8001".to_string(),
            request_timeout_secs: 120,
            processing_connect_timeout_secs: 5,
            processing_timeout_secs: 90,
            html_snapshot_limit: 10_000,
        }
    }
}

impl ScrapingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Processing (back-end) server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Bind address (e.g., "127.0.0.1:8001").
    pub bind_address: String,

    /// Worker processes in the pool; 0 means one per available CPU.
    pub workers: usize,

    /// Per sub-task result deadline in seconds.
    pub task_timeout_secs: u64,

    /// Deadline for reading the request frame in seconds.
    pub read_timeout_secs: u64,

    /// Maximum concurrently handled connections (backpressure).
    pub max_connections: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8001".to_string(),
            workers: 0,
            task_timeout_secs: 30,
            read_timeout_secs: 30,
            max_connections: 1024,
        }
    }
}

impl ProcessingConfig {
    /// Resolve the configured worker count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Bounded fetcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum fetches in flight at once (admission gate).
    pub max_concurrent: usize,

    /// Maximum concurrent connections to one host.
    pub per_host_limit: usize,

    /// Total per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Size ceiling for text bodies in bytes.
    pub max_text_bytes: usize,

    /// Size ceiling for binary bodies in bytes.
    pub max_binary_bytes: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Delay after closing the client, in milliseconds.
    pub close_grace_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            per_host_limit: 5,
            timeout_secs: 30,
            max_text_bytes: 10 * 1024 * 1024,  // 10MB
            max_binary_bytes: 5 * 1024 * 1024, // 5MB
            user_agent: "Mozilla/5.0 (compatible; WebScraper/1.0)".to_string(),
            close_grace_ms: 250,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Heavy task tuning.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub screenshot: ScreenshotConfig,
    pub performance: PerformanceConfig,
    pub thumbnails: ThumbnailConfig,
}

/// Headless browser screenshot settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Browser executable (name on PATH or absolute path).
    pub browser: String,

    pub width: u32,
    pub height: u32,

    /// Page load deadline in seconds.
    pub page_load_timeout_secs: u64,

    /// Extra time given to scripts before capture, in milliseconds.
    pub settle_ms: u64,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            width: 1920,
            height: 1080,
            page_load_timeout_secs: 15,
            settle_ms: 2000,
        }
    }
}

/// Performance probe settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Page GET timeout in seconds.
    pub timeout_secs: u64,

    /// HEAD timeout per resource in seconds.
    pub head_timeout_secs: u64,

    /// Maximum resources probed with HEAD.
    pub max_probed_resources: usize,

    /// Size assumed for a resource whose size is unknown, in bytes.
    pub fallback_resource_bytes: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            head_timeout_secs: 5,
            max_probed_resources: 10,
            fallback_resource_bytes: 50 * 1024,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Bounding box edge in pixels.
    pub max_edge: u32,

    /// Maximum images turned into thumbnails.
    pub max_images: usize,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// Image download timeout in seconds.
    pub download_timeout_secs: u64,

    /// Image download ceiling in bytes.
    pub max_download_bytes: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_edge: 200,
            max_images: 3,
            jpeg_quality: 85,
            download_timeout_secs: 10,
            max_download_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
