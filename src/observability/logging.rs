//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for each binary
//! - Pick the log level from `RUST_LOG`, falling back to config
//! - Route worker process logs to stderr (stdout carries frames)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

fn filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "scrape_relay={level},scraping_server={level},processing_server={level},tower_http=info",
            level = config.log_level
        )
        .into()
    })
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &ObservabilityConfig, target: LogTarget) {
    let registry = tracing_subscriber::registry().with(filter(config));
    let result = match target {
        LogTarget::Stdout => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogTarget::Stderr => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}
