//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout / stderr log lines
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted strings
//! - Front-end requests are traced per request and tagged with `x-request-id`
//! - Metrics are cheap and no-ops when the exporter is disabled

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogTarget};
