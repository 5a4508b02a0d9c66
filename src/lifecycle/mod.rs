//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     scraping server:   stop serving → close fetcher → exit
//!     processing server: stop accepting → drain connections → drain pool → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
