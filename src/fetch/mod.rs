//! Outbound fetching subsystem.
//!
//! # Data Flow
//! ```text
//! fetch(url)
//!     → timeout starts
//!     → limits.rs per-host slot
//!     → admission semaphore (max in flight)
//!     → lazily created pooled session
//!     → status check + streamed size ceiling
//!     → body
//! ```
//!
//! # Design Decisions
//! - Waiting callers suspend; nothing is rejected for being over the limit
//! - Fan-out (`fetch_multiple`) is best-effort; `fetch_each` keeps every outcome
//! - The session is owned by the fetcher and released by `close()`

pub mod client;
pub mod limits;

pub use client::{FetchError, FetchResult, Fetcher};
pub use limits::{HostLimiter, HostPermit};
