//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that listen addresses are `host:port` (IP literal or hostname)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// One failed semantic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Run every semantic check and collect the failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_listen_addr(&mut errors, "scraping.bind_address", &config.scraping.bind_address);
    check_positive(&mut errors, "scraping.request_timeout_secs", config.scraping.request_timeout_secs);
    check_positive(
        &mut errors,
        "scraping.processing_timeout_secs",
        config.scraping.processing_timeout_secs,
    );
    check_positive(
        &mut errors,
        "scraping.processing_connect_timeout_secs",
        config.scraping.processing_connect_timeout_secs,
    );
    if config.scraping.processing_address.trim().is_empty() {
        errors.push(ValidationError {
            field: "scraping.processing_address",
            message: "must not be empty".to_string(),
        });
    }

    check_listen_addr(&mut errors, "processing.bind_address", &config.processing.bind_address);
    check_positive(&mut errors, "processing.task_timeout_secs", config.processing.task_timeout_secs);
    check_positive(&mut errors, "processing.read_timeout_secs", config.processing.read_timeout_secs);
    check_positive(&mut errors, "processing.max_connections", config.processing.max_connections as u64);

    check_positive(&mut errors, "fetcher.max_concurrent", config.fetcher.max_concurrent as u64);
    check_positive(&mut errors, "fetcher.per_host_limit", config.fetcher.per_host_limit as u64);
    check_positive(&mut errors, "fetcher.timeout_secs", config.fetcher.timeout_secs);
    check_positive(&mut errors, "fetcher.max_text_bytes", config.fetcher.max_text_bytes as u64);
    check_positive(&mut errors, "fetcher.max_binary_bytes", config.fetcher.max_binary_bytes as u64);

    let quality = config.tasks.thumbnails.jpeg_quality;
    if quality == 0 || quality > 100 {
        errors.push(ValidationError {
            field: "tasks.thumbnails.jpeg_quality",
            message: format!("must be within 1..=100, got {}", quality),
        });
    }
    check_positive(&mut errors, "tasks.thumbnails.max_edge", config.tasks.thumbnails.max_edge as u64);

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Hostnames are resolved when binding, so only the shape is checked here.
fn check_listen_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_ok() {
        return;
    }
    let valid = match value.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains(|c: char| c.is_whitespace() || c == ':' || c == '[' || c == ']')
                && port.parse::<u16>().is_ok()
        }
        None => false,
    };
    if !valid {
        errors.push(ValidationError {
            field,
            message: format!("invalid listen address '{}': expected host:port", value),
        });
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError {
            field,
            message: format!("invalid socket address '{}': {}", value, e),
        });
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field,
            message: "must be greater than zero".to_string(),
        });
    }
}
