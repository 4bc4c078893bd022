//! Per-destination concurrency limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Number of tracked hosts above which idle entries are dropped.
const PRUNE_THRESHOLD: usize = 1024;

/// Bounds the number of in-flight deliveries to a single host.
///
/// A limit of zero disables limiting. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct DestinationLimiter {
    limit: usize,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl DestinationLimiter {
    /// Creates a limiter allowing `limit` concurrent deliveries per host.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            hosts: Arc::default(),
        }
    }

    /// Returns the per-host limit, zero when unlimited.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Waits for a delivery slot to `host`.
    ///
    /// Returns `None` when limiting is disabled; otherwise the slot is held
    /// until the permit is dropped.
    pub async fn acquire(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        if self.limit == 0 {
            return None;
        }

        let semaphore = self.semaphore(host);
        // The semaphore is never closed.
        semaphore.acquire_owned().await.ok()
    }

    /// Returns the number of hosts currently tracked.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);

        if hosts.len() >= PRUNE_THRESHOLD {
            let limit = self.limit;
            hosts.retain(|_, s| Arc::strong_count(s) > 1 || s.available_permits() < limit);
        }

        let host = host.to_ascii_lowercase();
        hosts
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
            .clone()
    }
}
