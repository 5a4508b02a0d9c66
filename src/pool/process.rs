//! Workers backed by OS child processes.
//!
//! Each worker is the processing-server binary re-executed in `worker`
//! mode. Tasks and replies travel as frames over the child's stdin and
//! stdout; stderr is inherited so worker logs reach the parent's terminal.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::config::TaskConfig;
use crate::pool::worker::{PoolError, TaskError, Worker, WorkerFactory};
use crate::protocol::{self, HeavyTask, WorkerReply};

const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Starts one child process per pool slot.
#[derive(Debug, Clone)]
pub struct ProcessWorkerFactory {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessWorkerFactory {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-execute the running binary as `<exe> worker --settings <json>`.
    pub fn current_exe(settings: &TaskConfig) -> Result<Self, PoolError> {
        let program = std::env::current_exe().map_err(|e| PoolError::Spawn {
            slot: 0,
            reason: format!("cannot locate current executable: {}", e),
        })?;
        let settings = serde_json::to_string(settings).map_err(|e| PoolError::Spawn {
            slot: 0,
            reason: format!("cannot encode worker settings: {}", e),
        })?;
        Ok(Self::new(
            program,
            vec!["worker".to_string(), "--settings".to_string(), settings],
        ))
    }
}

impl WorkerFactory for ProcessWorkerFactory {
    fn spawn(&self, slot: usize) -> Result<Box<dyn Worker>, PoolError> {
        let spawn_error = |reason: String| PoolError::Spawn { slot, reason };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("child stdout unavailable".into()))?;

        tracing::debug!(slot, pid = ?child.id(), "Worker process started");
        Ok(Box::new(ProcessWorker {
            slot,
            child,
            stdin,
            stdout: BufReader::new(stdout),
        }))
    }
}

struct ProcessWorker {
    slot: usize,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[async_trait]
impl Worker for ProcessWorker {
    async fn execute(&mut self, task: HeavyTask) -> Result<Value, TaskError> {
        let lost = |e: protocol::ProtocolError| TaskError::WorkerLost(e.to_string());

        protocol::send(&mut self.stdin, &task).await.map_err(lost)?;
        let reply: WorkerReply = protocol::receive(&mut self.stdout).await.map_err(lost)?;

        match reply {
            WorkerReply::Ok { value } => Ok(value),
            WorkerReply::Err { message } => Err(TaskError::Failed(message)),
        }
    }

    async fn shutdown(self: Box<Self>) {
        let ProcessWorker {
            slot,
            mut child,
            mut stdin,
            ..
        } = *self;

        // EOF on stdin ends the worker's read loop.
        let _ = stdin.shutdown().await;
        drop(stdin);

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(slot, %status, "Worker process exited"),
            Ok(Err(e)) => tracing::warn!(slot, error = %e, "Failed to reap worker process"),
            Err(_) => {
                tracing::warn!(slot, "Worker process did not exit, killing");
                let _ = child.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let factory = ProcessWorkerFactory::new("/nonexistent/scrape-relay-worker", vec![]);
        match factory.spawn(3) {
            Err(PoolError::Spawn { slot, .. }) => assert_eq!(slot, 3),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_exiting_mid_task_is_worker_lost() {
        // `true` exits immediately without answering.
        let factory = ProcessWorkerFactory::new("true", vec![]);
        let mut worker = factory.spawn(0).unwrap();
        let result = worker
            .execute(HeavyTask::Screenshot {
                url: "https://example.com".into(),
            })
            .await;
        assert!(matches!(result, Err(TaskError::WorkerLost(_))));
        worker.shutdown().await;
    }

    #[test]
    fn current_exe_passes_settings() {
        let factory = ProcessWorkerFactory::current_exe(&TaskConfig::default()).unwrap();
        assert_eq!(factory.args[0], "worker");
        assert_eq!(factory.args[1], "--settings");
        let parsed: TaskConfig = serde_json::from_str(&factory.args[2]).unwrap();
        assert_eq!(parsed, TaskConfig::default());
    }
}
