//! Fixed-size task pool.
//!
//! # Responsibilities
//! - Start a fixed number of workers at startup
//! - Queue submitted tasks without ever blocking the submitter
//! - Hand each result back through a per-task handle with its own timeout
//! - Replace workers that die
//! - Drain queued and running work on shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::pool::worker::{PoolError, TaskError, Worker, WorkerFactory};
use crate::protocol::HeavyTask;

type TaskReply = Result<Value, TaskError>;

struct Job {
    task: HeavyTask,
    reply: oneshot::Sender<TaskReply>,
}

type JobQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

#[derive(Debug, Default)]
struct PoolStats {
    queued: AtomicUsize,
    busy: AtomicUsize,
}

/// Pool of workers shared by every connection.
pub struct TaskPool {
    size: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PoolStats>,
}

impl TaskPool {
    /// Spawn `size` workers from `factory`.
    ///
    /// Fails if any initial worker cannot be started.
    pub fn start(size: usize, factory: Arc<dyn WorkerFactory>) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: JobQueue = Arc::new(tokio::sync::Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());

        let mut workers = Vec::with_capacity(size);
        for slot in 0..size {
            // On error the sender is dropped and already started loops wind down.
            let worker = factory.spawn(slot)?;
            workers.push(tokio::spawn(worker_loop(
                slot,
                worker,
                Arc::clone(&factory),
                Arc::clone(&queue),
                Arc::clone(&stats),
            )));
        }

        tracing::info!(workers = size, "Task pool started");
        Ok(Self {
            size,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            stats,
        })
    }

    /// Queue `task` and return a handle to its eventual result.
    pub fn submit(&self, task: HeavyTask) -> TaskHandle {
        let name = task.name();
        let (reply, receiver) = oneshot::channel();

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => {
                self.stats.queued.fetch_add(1, Ordering::SeqCst);
                if let Err(mpsc::error::SendError(job)) = tx.send(Job { task, reply }) {
                    self.stats.queued.fetch_sub(1, Ordering::SeqCst);
                    let _ = job.reply.send(Err(TaskError::PoolClosed));
                }
            }
            None => {
                let _ = reply.send(Err(TaskError::PoolClosed));
            }
        }

        TaskHandle {
            name,
            receiver,
            submitted: Instant::now(),
        }
    }

    /// Stop accepting tasks and wait for queued and running ones to finish.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        tracing::info!(
            queued = self.queued(),
            busy = self.busy(),
            "Task pool draining"
        );
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker loop panicked");
            }
        }
        tracing::info!("Task pool stopped");
    }

    /// Configured worker count.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.stats.queued.load(Ordering::SeqCst)
    }

    /// Workers currently running a task.
    pub fn busy(&self) -> usize {
        self.stats.busy.load(Ordering::SeqCst)
    }
}

/// Pending result of one submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    receiver: oneshot::Receiver<TaskReply>,
    submitted: Instant,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait up to `timeout` for the result.
    ///
    /// On timeout the handle is dropped; the task itself is not cancelled.
    pub async fn wait(self, timeout: Duration) -> Result<Value, TaskError> {
        let result = match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(TaskError::PoolClosed),
            Err(_) => Err(TaskError::Timeout(timeout)),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_task(self.name, outcome, self.submitted);
        result
    }
}

async fn worker_loop(
    slot: usize,
    worker: Box<dyn Worker>,
    factory: Arc<dyn WorkerFactory>,
    queue: JobQueue,
    stats: Arc<PoolStats>,
) {
    let mut worker = Some(worker);

    loop {
        let job = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };
        stats.queued.fetch_sub(1, Ordering::SeqCst);

        let name = job.task.name();
        if job.reply.is_closed() {
            tracing::debug!(slot, task = name, "Skipping task abandoned by its caller");
            continue;
        }

        let mut current = match worker.take() {
            Some(w) => w,
            None => match factory.spawn(slot) {
                Ok(w) => {
                    tracing::info!(slot, "Worker restarted");
                    metrics::record_worker_restart();
                    w
                }
                Err(e) => {
                    tracing::error!(slot, error = %e, "Failed to restart worker");
                    let _ = job.reply.send(Err(TaskError::WorkerLost(e.to_string())));
                    continue;
                }
            },
        };

        stats.busy.fetch_add(1, Ordering::SeqCst);
        let result = current.execute(job.task).await;
        stats.busy.fetch_sub(1, Ordering::SeqCst);

        if let Err(TaskError::WorkerLost(reason)) = &result {
            tracing::warn!(slot, task = name, reason = %reason, "Worker lost, will respawn");
            current.shutdown().await;
        } else {
            worker = Some(current);
        }

        if job.reply.send(result).is_err() {
            tracing::debug!(slot, task = name, "Result discarded, caller stopped waiting");
        }
    }

    if let Some(w) = worker {
        w.shutdown().await;
    }
    tracing::debug!(slot, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    /// Sleeps for the millisecond count in the task URL, then echoes it.
    struct SleepyWorker {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Worker for SleepyWorker {
        async fn execute(&mut self, task: HeavyTask) -> Result<Value, TaskError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let ms: u64 = task.url().parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            match task.url() {
                "fail" => Err(TaskError::Failed("boom".into())),
                "crash" => Err(TaskError::WorkerLost("exited".into())),
                _ => Ok(json!(task.url())),
            }
        }

        async fn shutdown(self: Box<Self>) {}
    }

    #[derive(Default)]
    struct SleepyFactory {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        spawned: AtomicU32,
    }

    impl WorkerFactory for SleepyFactory {
        fn spawn(&self, _slot: usize) -> Result<Box<dyn Worker>, PoolError> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SleepyWorker {
                running: Arc::clone(&self.running),
                peak: Arc::clone(&self.peak),
            }))
        }
    }

    fn task(url: &str) -> HeavyTask {
        HeavyTask::Performance { url: url.into() }
    }

    #[tokio::test]
    async fn zero_workers_rejected() {
        let err = TaskPool::start(0, Arc::new(SleepyFactory::default())).err();
        assert!(matches!(err, Some(PoolError::NoWorkers)));
    }

    #[tokio::test]
    async fn parallelism_capped_by_worker_count() {
        let factory = Arc::new(SleepyFactory::default());
        let pool = TaskPool::start(2, factory.clone()).unwrap();

        let handles: Vec<_> = (0..6).map(|_| pool.submit(task("50"))).collect();
        for handle in handles {
            assert_eq!(handle.wait(Duration::from_secs(5)).await.unwrap(), json!("50"));
        }
        assert_eq!(factory.peak.load(Ordering::SeqCst), 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_leaves_other_tasks_alone() {
        let pool = TaskPool::start(2, Arc::new(SleepyFactory::default())).unwrap();

        let slow = pool.submit(task("500"));
        let fast = pool.submit(task("10"));
        let (slow, fast) = tokio::join!(
            slow.wait(Duration::from_millis(50)),
            fast.wait(Duration::from_secs(5))
        );
        assert_eq!(slow, Err(TaskError::Timeout(Duration::from_millis(50))));
        assert_eq!(fast.unwrap(), json!("10"));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn failures_reported_and_lost_worker_replaced() {
        let factory = Arc::new(SleepyFactory::default());
        let pool = TaskPool::start(1, factory.clone()).unwrap();

        let failed = pool.submit(task("fail")).wait(Duration::from_secs(1)).await;
        assert_eq!(failed, Err(TaskError::Failed("boom".into())));

        let lost = pool.submit(task("crash")).wait(Duration::from_secs(1)).await;
        assert!(matches!(lost, Err(TaskError::WorkerLost(_))));

        let ok = pool.submit(task("1")).wait(Duration::from_secs(1)).await;
        assert_eq!(ok.unwrap(), json!("1"));
        assert_eq!(factory.spawned.load(Ordering::SeqCst), 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queued_work() {
        let pool = TaskPool::start(1, Arc::new(SleepyFactory::default())).unwrap();
        let first = pool.submit(task("30"));
        let second = pool.submit(task("30"));

        pool.shutdown().await;
        assert_eq!(pool.queued(), 0);
        assert_eq!(first.wait(Duration::from_millis(1)).await.unwrap(), json!("30"));
        assert_eq!(second.wait(Duration::from_millis(1)).await.unwrap(), json!("30"));

        let late = pool.submit(task("1")).wait(Duration::from_secs(1)).await;
        assert_eq!(late, Err(TaskError::PoolClosed));
    }

    #[tokio::test]
    async fn abandoned_queued_task_is_skipped() {
        let factory = Arc::new(SleepyFactory::default());
        let pool = TaskPool::start(1, factory.clone()).unwrap();

        let blocker = pool.submit(task("100"));
        let abandoned = pool.submit(task("fail"));
        drop(abandoned);

        assert_eq!(blocker.wait(Duration::from_secs(1)).await.unwrap(), json!("100"));
        let next = pool.submit(task("1")).wait(Duration::from_secs(1)).await;
        assert_eq!(next.unwrap(), json!("1"));
        pool.shutdown().await;
    }
}
