//! Heavy-task pool.
//!
//! # Data Flow
//! ```text
//! dispatcher ──submit(HeavyTask)──▶ queue ──▶ worker loop (one per slot)
//!      ▲                                          │
//!      └────── TaskHandle::wait(timeout) ◀────────┘ Worker::execute
//! ```
//!
//! # Design Decisions
//! - Fixed worker count; submissions queue without bound and never block
//! - Each task has its own reply channel, so one timeout never affects another
//! - Workers sit behind the `Worker` / `WorkerFactory` traits; production
//!   uses child processes, tests use in-process fakes
//! - A worker that reports `WorkerLost` is replaced before the next task

pub mod process;
pub mod task_pool;
pub mod worker;

pub use process::ProcessWorkerFactory;
pub use task_pool::{TaskHandle, TaskPool};
pub use worker::{PoolError, TaskError, Worker, WorkerFactory};
