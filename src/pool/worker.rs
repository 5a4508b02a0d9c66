//! Worker abstraction and pool error types.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::HeavyTask;

/// Why a submitted task produced no value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The caller stopped waiting. The worker may still be running it.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    /// The task ran and reported a failure.
    #[error("task failed: {0}")]
    Failed(String),

    /// The worker died or its channel broke while running the task.
    #[error("worker lost: {0}")]
    WorkerLost(String),

    /// The pool was shut down before the task could run.
    #[error("task pool is shut down")]
    PoolClosed,
}

impl TaskError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Timeout(_) => "timeout",
            TaskError::Failed(_) => "failed",
            TaskError::WorkerLost(_) => "worker_lost",
            TaskError::PoolClosed => "pool_closed",
        }
    }
}

/// Errors raised while building or growing the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task pool needs at least one worker")]
    NoWorkers,

    #[error("failed to start worker {slot}: {reason}")]
    Spawn { slot: usize, reason: String },
}

/// One execution slot. Runs one task at a time.
#[async_trait]
pub trait Worker: Send {
    /// Run `task` to completion.
    ///
    /// `TaskError::WorkerLost` tells the pool to discard this worker and
    /// start a fresh one for the next task.
    async fn execute(&mut self, task: HeavyTask) -> Result<Value, TaskError>;

    /// Stop the worker once it has no more work.
    async fn shutdown(self: Box<Self>);
}

/// Creates workers for pool slots, at startup and after a worker is lost.
pub trait WorkerFactory: Send + Sync + 'static {
    fn spawn(&self, slot: usize) -> Result<Box<dyn Worker>, PoolError>;
}
