//! HTTP front-end subsystem.
//!
//! # Data Flow
//! ```text
//! GET /scrape?url=...
//!     → server.rs (request id, trace span, request timeout)
//!     → orchestrator (fetch, analyze, processing round-trip)
//!     → response.rs (JSON body, status code)
//! ```

pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
