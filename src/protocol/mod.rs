//! Wire protocol shared by both servers.
//!
//! # Data Flow
//! ```text
//! scraping server                         processing server
//!     ProcessingRequest
//!     → frame.rs encode  ──[u32 BE len][JSON]──▶  frame.rs receive
//!                                                 → dispatcher
//!     frame.rs receive  ◀──[u32 BE len][JSON]──  frame.rs send
//!     ← ProcessingResult
//! ```
//!
//! The same framing carries `HeavyTask` / `WorkerReply` between the task
//! pool and its worker processes over stdin/stdout.
//!
//! # Design Decisions
//! - Length prefix plus JSON, no checksum and no version field
//! - Declared lengths above `MAX_FRAME_LEN` are rejected before any payload read
//! - A frame is delivered whole or not at all

pub mod frame;
pub mod messages;

pub use frame::{
    decode, encode, receive, receive_optional, send, ProtocolError, ProtocolResult, MAX_FRAME_LEN,
};
pub use messages::{HeavyTask, PerformanceMetrics, ProcessingRequest, ProcessingResult, WorkerReply};
