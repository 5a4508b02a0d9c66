//! Per-destination connection limits.
//!
//! The pooled HTTP client only bounds *idle* connections per host, so
//! concurrent connections to one origin are capped here with one semaphore
//! per `host:port`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{AcquireError, Semaphore};
use url::Url;

/// Caps concurrent requests per destination.
///
/// A destination is tracked only while some caller holds or awaits its slot.
#[derive(Debug)]
pub struct HostLimiter {
    per_host: usize,
    hosts: DashMap<String, Arc<Semaphore>>,
}

impl HostLimiter {
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            hosts: DashMap::new(),
        }
    }

    /// Wait for a connection slot towards `url`'s host.
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self, url: &Url) -> Result<HostPermit<'_>, AcquireError> {
        let key = host_key(url);
        let semaphore = self
            .hosts
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone();

        let mut slot = HostPermit {
            limiter: self,
            key,
            semaphore,
            held: false,
        };
        slot.semaphore.acquire().await?.forget();
        slot.held = true;
        Ok(slot)
    }

    /// Free slots towards `url`'s host.
    pub fn available(&self, url: &Url) -> usize {
        self.hosts
            .get(&host_key(url))
            .map(|s| s.available_permits())
            .unwrap_or(self.per_host)
    }

    /// Number of destinations currently held or awaited.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    /// Forget `key` once `semaphore` is referenced only by the map and the
    /// caller.
    fn untrack(&self, key: &str, semaphore: &Arc<Semaphore>) {
        self.hosts.remove_if(key, |_, tracked| {
            Arc::ptr_eq(tracked, semaphore) && Arc::strong_count(tracked) == 2
        });
    }
}

/// A connection slot towards one destination.
#[derive(Debug)]
pub struct HostPermit<'a> {
    limiter: &'a HostLimiter,
    key: String,
    semaphore: Arc<Semaphore>,
    held: bool,
}

impl Drop for HostPermit<'_> {
    fn drop(&mut self) {
        if self.held {
            self.semaphore.add_permits(1);
        }
        self.limiter.untrack(&self.key, &self.semaphore);
    }
}

fn host_key(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}
