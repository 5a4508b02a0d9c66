//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::{header, StatusCode},
    response::Html,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use scrape_relay::config::{AppConfig, ProcessingConfig};
use scrape_relay::lifecycle::Shutdown;
use scrape_relay::net::{Listener, ListenerError};
use scrape_relay::pool::{PoolError, TaskError, TaskPool, Worker, WorkerFactory};
use scrape_relay::processing::ProcessingServer;
use scrape_relay::protocol::HeavyTask;

pub const PAGE: &str = r#"<html><head><title>Mock Page</title>
<meta name="description" content="A page for tests"></head>
<body><h2>First</h2><h2>Second</h2><img src="/img/logo.png"><a href="/next">next</a></body></html>"#;

/// A 400x100 opaque PNG, served at `/img/logo.png`.
pub fn logo_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(400, 100, image::Rgba([200, 30, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Start a mock origin on an ephemeral port.
///
/// - `/page`: small HTML page (one title, two h2, one img)
/// - `/img/logo.png`: `logo_png()`
/// - `/slow`: same page after 300 ms
/// - `/hang`: same page after 3 s
/// - `/big`: 2 MiB of text
/// - anything else: 404
pub async fn start_origin() -> SocketAddr {
    let app = Router::new()
        .route("/page", get(|| async { Html(PAGE) }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Html(PAGE)
            }),
        )
        .route(
            "/hang",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Html(PAGE)
            }),
        )
        .route(
            "/img/logo.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], logo_png()) }),
        )
        .route("/big", get(|| async { "x".repeat(2 * 1024 * 1024) }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// In-process stand-in for a worker process.
///
/// Screenshots fail when `fail_screenshot` is set; performance sleeps for
/// `performance_delay` first; thumbnails return one fixed image.
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub fail_screenshot: bool,
    pub performance_delay: Duration,
    pub executed: Arc<AtomicUsize>,
}

struct FakeWorker {
    config: FakeFactory,
}

#[async_trait]
impl Worker for FakeWorker {
    async fn execute(&mut self, task: HeavyTask) -> Result<Value, TaskError> {
        self.config.executed.fetch_add(1, Ordering::SeqCst);
        match task {
            HeavyTask::Screenshot { .. } if self.config.fail_screenshot => {
                Err(TaskError::Failed("browser error: chromium not found".into()))
            }
            HeavyTask::Screenshot { .. } => Ok(json!("iVBORw0KGgo=")),
            HeavyTask::Performance { .. } => {
                tokio::time::sleep(self.config.performance_delay).await;
                Ok(json!({
                    "load_time_ms": 120,
                    "total_size_kb": 48,
                    "num_requests": 4,
                    "html_size_kb": 12,
                    "num_resources": 3
                }))
            }
            HeavyTask::Thumbnails { .. } => Ok(json!(["/9j/4AAQSkZJRg=="])),
        }
    }

    async fn shutdown(self: Box<Self>) {}
}

impl WorkerFactory for FakeFactory {
    fn spawn(&self, _slot: usize) -> Result<Box<dyn Worker>, PoolError> {
        Ok(Box::new(FakeWorker { config: self.clone() }))
    }
}

pub struct RunningProcessing {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

/// Start a processing server backed by fake workers.
pub async fn start_processing(factory: FakeFactory, config: ProcessingConfig) -> RunningProcessing {
    let listener = Listener::bind("127.0.0.1:0", config.max_connections).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = Arc::new(TaskPool::start(2, Arc::new(factory)).unwrap());
    let shutdown = Shutdown::new();
    let server = ProcessingServer::new(&config, pool);
    let handle = tokio::spawn(server.run(listener, shutdown.signalled()));

    RunningProcessing { addr, shutdown, handle }
}

/// Front-end config pointing at `processing`.
pub fn scraping_config(processing: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.scraping.bind_address = "127.0.0.1:0".into();
    config.scraping.processing_address = processing.to_string();
    config.scraping.processing_timeout_secs = 5;
    config.scraping.request_timeout_secs = 10;
    config.fetcher.timeout_secs = 5;
    config.fetcher.close_grace_ms = 0;
    config
}
