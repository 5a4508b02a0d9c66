//! Per-connection request handling.
//!
//! One request frame in, one reply frame out. The three heavy sub-tasks of a
//! request go to the shared pool together and are awaited concurrently;
//! each one that fails or times out empties only its own field.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ProcessingConfig;
use crate::net::{ConnectionGuard, ConnectionState};
use crate::observability::metrics;
use crate::pool::{TaskError, TaskHandle, TaskPool};
use crate::protocol::{self, HeavyTask, ProcessingRequest, ProcessingResult};

/// Handles back-end connections against a shared task pool.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<TaskPool>,
    task_timeout: Duration,
    read_timeout: Duration,
}

struct Subtasks {
    screenshot: TaskHandle,
    performance: TaskHandle,
    thumbnails: TaskHandle,
}

impl Dispatcher {
    pub fn new(pool: Arc<TaskPool>, config: &ProcessingConfig) -> Self {
        Self::with_timeouts(pool, config.task_timeout(), config.read_timeout())
    }

    pub fn with_timeouts(pool: Arc<TaskPool>, task_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            pool,
            task_timeout,
            read_timeout,
        }
    }

    /// Serve one request on `stream`, then close it.
    pub async fn handle_connection<S>(&self, mut stream: S, mut guard: ConnectionGuard)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let id = guard.id();

        let received = tokio::time::timeout(
            self.read_timeout,
            protocol::receive_optional::<_, ProcessingRequest>(&mut stream),
        )
        .await;

        let request = match received {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                tracing::debug!(connection_id = %id, "Peer closed without sending a request");
                return;
            }
            Ok(Err(e)) => {
                metrics::record_protocol_error(e.kind());
                tracing::warn!(connection_id = %id, error = %e, "Failed to read request");
                self.reply_error(&mut stream, &mut guard, &e.to_string()).await;
                return;
            }
            Err(_) => {
                metrics::record_protocol_error("read_timeout");
                tracing::warn!(
                    connection_id = %id,
                    timeout_secs = self.read_timeout.as_secs(),
                    "Timed out waiting for request"
                );
                self.reply_error(&mut stream, &mut guard, "timed out waiting for request")
                    .await;
                return;
            }
        };

        guard.transition(ConnectionState::Dispatching);
        tracing::info!(connection_id = %id, url = %request.url, "Processing request");
        let url = request.url.clone();
        let subtasks = self.submit(request);

        guard.transition(ConnectionState::AwaitingSubtasks);
        let result = self.collect(subtasks, &url).await;

        guard.transition(ConnectionState::Replying);
        match protocol::send(&mut stream, &result).await {
            Ok(()) => tracing::info!(
                connection_id = %id,
                url = %url,
                screenshot = result.screenshot.is_some(),
                performance = result.performance.is_some(),
                thumbnails = result.thumbnails.len(),
                "Reply sent"
            ),
            Err(e) => {
                metrics::record_protocol_error(e.kind());
                tracing::warn!(connection_id = %id, error = %e, "Failed to send reply");
            }
        }
        let _ = stream.shutdown().await;
    }

    /// Run all sub-tasks for `request` and merge whatever they produce.
    pub async fn process(&self, request: ProcessingRequest) -> ProcessingResult {
        let url = request.url.clone();
        let subtasks = self.submit(request);
        self.collect(subtasks, &url).await
    }

    fn submit(&self, request: ProcessingRequest) -> Subtasks {
        let ProcessingRequest { url, html } = request;
        Subtasks {
            screenshot: self.pool.submit(HeavyTask::Screenshot { url: url.clone() }),
            performance: self.pool.submit(HeavyTask::Performance { url: url.clone() }),
            thumbnails: self.pool.submit(HeavyTask::Thumbnails { url, html }),
        }
    }

    async fn collect(&self, subtasks: Subtasks, url: &str) -> ProcessingResult {
        let timeout = self.task_timeout;
        let (screenshot, performance, thumbnails) = tokio::join!(
            subtasks.screenshot.wait(timeout),
            subtasks.performance.wait(timeout),
            subtasks.thumbnails.wait(timeout),
        );

        ProcessingResult {
            screenshot: settle(url, "screenshot", screenshot).and_then(|v| match v {
                Value::String(png) => Some(png),
                _ => None,
            }),
            performance: settle(url, "performance", performance)
                .and_then(|v| serde_json::from_value(v).ok()),
            thumbnails: settle(url, "thumbnails", thumbnails)
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            error: None,
        }
    }

    async fn reply_error<S>(&self, stream: &mut S, guard: &mut ConnectionGuard, reason: &str)
    where
        S: AsyncWrite + Unpin,
    {
        guard.transition(ConnectionState::Replying);
        let reply = ProcessingResult::failed(format!("Processing error: {}", reason));
        if let Err(e) = protocol::send(stream, &reply).await {
            tracing::debug!(connection_id = %guard.id(), error = %e, "Could not deliver error reply");
        }
        let _ = stream.shutdown().await;
    }
}

fn settle(url: &str, task: &'static str, result: Result<Value, TaskError>) -> Option<Value> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(url = %url, task, error = %e, "Sub-task produced no result");
            None
        }
    }
}
