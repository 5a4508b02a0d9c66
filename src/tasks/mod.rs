//! Heavy tasks run inside worker processes.
//!
//! A worker reads `HeavyTask` frames from its input, runs each one with a
//! `TaskRunner`, and writes back a `WorkerReply` frame. One task runs at a
//! time per worker; parallelism comes from the pool's worker count.

pub mod performance;
pub mod screenshot;
pub mod thumbnails;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::TaskConfig;
use crate::fetch::{FetchError, Fetcher};
use crate::protocol::{self, HeavyTask, ProtocolResult, WorkerReply};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PerformanceAnalyzer/1.0)";

/// Why a heavy task produced nothing.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<url::ParseError> for TaskFailure {
    fn from(e: url::ParseError) -> Self {
        TaskFailure::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for TaskFailure {
    fn from(e: reqwest::Error) -> Self {
        TaskFailure::Http(e.to_string())
    }
}

impl From<FetchError> for TaskFailure {
    fn from(e: FetchError) -> Self {
        TaskFailure::Http(e.to_string())
    }
}

impl From<image::ImageError> for TaskFailure {
    fn from(e: image::ImageError) -> Self {
        TaskFailure::Image(e.to_string())
    }
}

/// Runs heavy tasks with HTTP clients shared for the worker's lifetime.
pub struct TaskRunner {
    config: TaskConfig,
    client: reqwest::Client,
    images: Fetcher,
}

impl TaskRunner {
    pub fn new(config: TaskConfig) -> Result<Self, TaskFailure> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let images = thumbnails::image_fetcher(&config.thumbnails, USER_AGENT);
        Ok(Self { config, client, images })
    }

    /// Run one task and return its JSON value.
    pub async fn run(&self, task: HeavyTask) -> Result<Value, TaskFailure> {
        match task {
            HeavyTask::Screenshot { url } => {
                let png = screenshot::capture(&url, &self.config.screenshot).await?;
                Ok(Value::String(png))
            }
            HeavyTask::Performance { url } => {
                let metrics =
                    performance::analyze(&self.client, &url, &self.config.performance).await?;
                Ok(serde_json::to_value(metrics)?)
            }
            HeavyTask::Thumbnails { url, html } => {
                let thumbs =
                    thumbnails::generate(&self.images, &url, &html, &self.config.thumbnails).await?;
                Ok(serde_json::to_value(thumbs)?)
            }
        }
    }
}

/// Worker loop: answer every task frame on `reader` until it reaches EOF.
///
/// Task failures become `WorkerReply::Err`; only I/O and framing errors end
/// the loop early.
pub async fn serve<R, W>(mut reader: R, mut writer: W, settings: TaskConfig) -> ProtocolResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let runner = TaskRunner::new(settings).map_err(|e| std::io::Error::other(e.to_string()))?;

    while let Some(task) = protocol::receive_optional::<_, HeavyTask>(&mut reader).await? {
        let name = task.name();
        let url = task.url().to_string();

        let reply = match runner.run(task).await {
            Ok(value) => WorkerReply::Ok { value },
            Err(e) => {
                tracing::warn!(task = name, url = %url, error = %e, "Task failed");
                WorkerReply::Err {
                    message: e.to_string(),
                }
            }
        };
        protocol::send(&mut writer, &reply).await?;
    }

    tracing::debug!("Task input closed, worker exiting");
    Ok(())
}
