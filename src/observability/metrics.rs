//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scrape_requests_total` (counter): `/scrape` outcomes by status
//! - `scrape_duration_seconds` (histogram): end-to-end scrape latency
//! - `fetch_requests_total` (counter): fetcher outcomes
//! - `heavy_tasks_total` (counter): sub-task outcomes by task and result
//! - `heavy_task_duration_seconds` (histogram): time to settle a sub-task
//! - `protocol_errors_total` (counter): framing errors by kind
//! - `processing_connections_total` (counter): accepted back-end connections
//! - `worker_restarts_total` (counter): respawned worker processes
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_scrape(status: &'static str, start: Instant) {
    counter!("scrape_requests_total", "status" => status).increment(1);
    histogram!("scrape_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_fetch(outcome: &'static str) {
    counter!("fetch_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_task(task: &'static str, outcome: &'static str, start: Instant) {
    counter!("heavy_tasks_total", "task" => task, "outcome" => outcome).increment(1);
    histogram!("heavy_task_duration_seconds", "task" => task).record(start.elapsed().as_secs_f64());
}

pub fn record_protocol_error(kind: &'static str) {
    counter!("protocol_errors_total", "kind" => kind).increment(1);
}

pub fn record_connection() {
    counter!("processing_connections_total").increment(1);
}

pub fn record_worker_restart() {
    counter!("worker_restarts_total").increment(1);
}
