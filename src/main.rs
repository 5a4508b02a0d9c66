//! Scraping server.
//!
//! HTTP front-end that fetches pages, analyzes them and forwards each one to
//! the processing server.
//!
//! ```text
//!  client ──GET /scrape?url=──▶ ┌──────────────────────────────┐
//!                               │ scraping-server              │
//!                               │  http → orchestrator         │
//!                               │        ├─ fetch (bounded)    │ ──▶ origin
//!                               │        ├─ analysis           │
//!                               │        └─ processing client  │ ──frame──▶ processing-server
//!  client ◀──── ScrapeResult ── └──────────────────────────────┘ ◀─frame──
//! ```
//!
//! Runs on a single-threaded runtime; concurrency comes from suspending at
//! fetches and protocol I/O.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use scrape_relay::config::{load_or_default, override_address, validate_config, AppConfig, ConfigError};
use scrape_relay::http::HttpServer;
use scrape_relay::lifecycle::{signals, Shutdown};
use scrape_relay::observability::{init_logging, metrics, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "scraping-server")]
#[command(about = "Asynchronous web scraping front-end", long_about = None)]
struct Cli {
    /// Listen address (IPv4, IPv6 or hostname)
    #[arg(short, long)]
    ip: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum concurrent page fetches
    #[arg(short, long)]
    workers: Option<usize>,

    /// Processing server host
    #[arg(long)]
    processing_host: Option<String>,

    /// Processing server port
    #[arg(long)]
    processing_port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if self.ip.is_some() || self.port.is_some() {
            config.scraping.bind_address =
                override_address(&config.scraping.bind_address, self.ip.as_deref(), self.port);
        }
        if self.processing_host.is_some() || self.processing_port.is_some() {
            config.scraping.processing_address = override_address(
                &config.scraping.processing_address,
                self.processing_host.as_deref(),
                self.processing_port,
            );
        }
        if let Some(workers) = self.workers {
            config.fetcher.max_concurrent = workers;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);

    init_logging(&config.observability, LogTarget::Stdout);
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        bind_address = %config.scraping.bind_address,
        processing_address = %config.scraping.processing_address,
        max_concurrent = config.fetcher.max_concurrent,
        request_timeout_secs = config.scraping.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.scraping.bind_address).await?;

    let shutdown = Shutdown::new();
    signals::install(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
