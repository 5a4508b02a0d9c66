//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flag overrides (binaries)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - One file describes both servers; each binary reads its own sections

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, override_address, parse_config, ConfigError};
pub use schema::{
    AppConfig, FetcherConfig, ObservabilityConfig, PerformanceConfig, ProcessingConfig,
    ScrapingConfig, ScreenshotConfig, TaskConfig, ThumbnailConfig,
};
pub use validation::validate_config;
