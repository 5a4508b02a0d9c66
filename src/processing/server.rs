//! Processing server accept loop.
//!
//! # Responsibilities
//! - Accept connections under the listener's connection limit
//! - Spawn one dispatcher task per connection
//! - On shutdown: stop accepting, wait for open connections, drain the pool

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProcessingConfig;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::pool::TaskPool;
use crate::processing::dispatcher::Dispatcher;

/// Extra time granted to open connections beyond their own timeouts.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Back-end server: one request/response exchange per TCP connection.
pub struct ProcessingServer {
    dispatcher: Dispatcher,
    pool: Arc<TaskPool>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl ProcessingServer {
    pub fn new(config: &ProcessingConfig, pool: Arc<TaskPool>) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&pool), config),
            pool,
            tracker: ConnectionTracker::new(),
            drain_timeout: config.read_timeout() + config.task_timeout() + DRAIN_GRACE,
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve until `shutdown` resolves, then drain connections and the pool.
    pub async fn run<F>(self, listener: Listener, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                workers = self.pool.size(),
                "Processing server starting"
            );
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        metrics::record_connection();
                        let guard = self.tracker.track();
                        tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, "Connection opened");

                        let dispatcher = self.dispatcher.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            dispatcher.handle_connection(stream, guard).await;
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        // Typically EMFILE.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        drop(listener);
        tracing::info!(
            open_connections = self.tracker.active_count(),
            "Stopped accepting, draining connections"
        );
        if !self.tracker.wait_for_idle(self.drain_timeout).await {
            tracing::warn!(
                open_connections = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }

        self.pool.shutdown().await;
        tracing::info!("Processing server stopped");
        Ok(())
    }
}
