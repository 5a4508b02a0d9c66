//! Back-end processing service.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (bounded accept, one task per connection)
//!     → dispatcher.rs
//!         AwaitingFrame    read ProcessingRequest (read timeout)
//!         Dispatching      submit screenshot / performance / thumbnails
//!         AwaitingSubtasks wait for all three, each with the task timeout
//!         Replying         send ProcessingResult
//!         Closed
//! ```
//!
//! A bad frame or read timeout gets a best-effort error reply; an empty
//! connection is closed without one.

pub mod dispatcher;
pub mod server;

pub use dispatcher::Dispatcher;
pub use server::ProcessingServer;
