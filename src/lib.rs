//! Two-server page scraping and processing.
//!
//! The scraping server (HTTP front-end) fetches and analyzes pages, then
//! hands each one to the processing server over a length-prefixed JSON
//! protocol for screenshots, performance probing and thumbnails.

pub mod analysis;
pub mod config;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod orchestrator;
pub mod pool;
pub mod processing;
pub mod protocol;
pub mod tasks;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use processing::ProcessingServer;
