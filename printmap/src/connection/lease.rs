//! Connection leases and the counters behind them.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::update_peak;

/// Per-host semaphores keyed by host key.
///
/// An entry lives while someone holds or waits on its semaphore; the last
/// release removes it, so the map tracks only hosts with work in progress.
pub(super) type HostSemaphores = DashMap<String, Arc<Semaphore>>;

/// Removes `host`'s semaphore when the map holds the only reference to it.
///
/// Callers clone the semaphore under the same shard lock, so a waiter or a
/// lease always keeps its entry alive.
pub(super) fn prune_host(hosts: &HostSemaphores, host: &str) {
    hosts.remove_if(host, |_, semaphore| Arc::strong_count(semaphore) == 1);
}

/// Outstanding lease counts, per host and overall.
///
/// Only [`LeaseCounters::acquired`] and [`LeaseCounters::released`] mutate
/// these, and only from lease construction and [`ConnectionLease::release`].
/// A host's counter is dropped when it returns to zero.
#[derive(Debug, Default)]
pub(super) struct LeaseCounters {
    global: AtomicUsize,
    peak_global: AtomicUsize,
    hosts: DashMap<String, AtomicUsize>,
    peak_host: AtomicUsize,
}

impl LeaseCounters {
    pub(super) fn acquired(&self, host: &str) {
        let current = self.global.fetch_add(1, Ordering::AcqRel) + 1;
        update_peak(&self.peak_global, current);

        let host_current = self
            .hosts
            .entry(host.to_string())
            .or_default()
            .fetch_add(1, Ordering::AcqRel)
            + 1;
        update_peak(&self.peak_host, host_current);
    }

    pub(super) fn released(&self, host: &str) {
        if let Some(counter) = self.hosts.get(host) {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
        self.hosts
            .remove_if(host, |_, counter| counter.load(Ordering::Acquire) == 0);
        self.global.fetch_sub(1, Ordering::AcqRel);
    }

    pub(super) fn global(&self) -> usize {
        self.global.load(Ordering::Acquire)
    }

    pub(super) fn host(&self, host: &str) -> usize {
        self.hosts
            .get(host)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub(super) fn peak_global(&self) -> usize {
        self.peak_global.load(Ordering::Acquire)
    }

    pub(super) fn peak_host(&self) -> usize {
        self.peak_host.load(Ordering::Acquire)
    }

    pub(super) fn hosts_tracked(&self) -> usize {
        self.hosts.len()
    }
}

/// Permit for one in-flight request against a host and the global limit.
///
/// Released exactly once: either explicitly through
/// [`release`](Self::release) or when dropped.
pub struct ConnectionLease {
    host: String,
    permits: Option<(OwnedSemaphorePermit, OwnedSemaphorePermit)>,
    counters: Arc<LeaseCounters>,
    hosts: Arc<HostSemaphores>,
}

impl ConnectionLease {
    pub(super) fn new(
        host: String,
        host_permit: OwnedSemaphorePermit,
        global_permit: OwnedSemaphorePermit,
        counters: Arc<LeaseCounters>,
        hosts: Arc<HostSemaphores>,
    ) -> Self {
        counters.acquired(&host);
        Self {
            host,
            permits: Some((host_permit, global_permit)),
            counters,
            hosts,
        }
    }

    /// Host key this lease counts against.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_released(&self) -> bool {
        self.permits.is_none()
    }

    /// Gives the host and global slots back. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(permits) = self.permits.take() {
            // Counters drop before the permits so a waiter can never observe
            // more outstanding leases than the limit.
            self.counters.released(&self.host);
            drop(permits);
            prune_host(&self.hosts, &self.host);
        }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("host", &self.host)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Semaphore;

    fn permit(sem: &Arc<Semaphore>) -> OwnedSemaphorePermit {
        Arc::clone(sem).try_acquire_owned().unwrap()
    }

    #[test]
    fn test_release_is_idempotent() {
        let host_sem = Arc::new(Semaphore::new(1));
        let global_sem = Arc::new(Semaphore::new(1));
        let counters = Arc::new(LeaseCounters::default());

        let mut lease = ConnectionLease::new(
            "a:80".to_string(),
            permit(&host_sem),
            permit(&global_sem),
            Arc::clone(&counters),
            Arc::default(),
        );
        assert_eq!(counters.global(), 1);
        assert_eq!(counters.host("a:80"), 1);
        assert_eq!(host_sem.available_permits(), 0);

        lease.release();
        lease.release();
        drop(lease);

        assert_eq!(counters.global(), 0);
        assert_eq!(counters.host("a:80"), 0);
        assert_eq!(host_sem.available_permits(), 1);
        assert_eq!(global_sem.available_permits(), 1);
    }

    #[test]
    fn test_peaks_survive_release() {
        let sem = Arc::new(Semaphore::new(4));
        let counters = Arc::new(LeaseCounters::default());

        let hosts = Arc::new(HostSemaphores::new());
        let a = ConnectionLease::new("a".into(), permit(&sem), permit(&sem), Arc::clone(&counters), Arc::clone(&hosts));
        let b = ConnectionLease::new("b".into(), permit(&sem), permit(&sem), Arc::clone(&counters), Arc::clone(&hosts));
        assert_eq!(counters.peak_global(), 2);
        assert_eq!(counters.peak_host(), 1);

        drop(a);
        drop(b);
        assert_eq!(counters.global(), 0);
        assert_eq!(counters.peak_global(), 2);
    }

    #[test]
    fn test_last_release_prunes_host_entries() {
        let global_sem = Arc::new(Semaphore::new(4));
        let counters = Arc::new(LeaseCounters::default());
        let hosts = Arc::new(HostSemaphores::new());
        let host_sem = Arc::new(Semaphore::new(2));
        hosts.insert("a:80".to_string(), Arc::clone(&host_sem));

        let first = ConnectionLease::new(
            "a:80".into(),
            permit(&host_sem),
            permit(&global_sem),
            Arc::clone(&counters),
            Arc::clone(&hosts),
        );
        let second = ConnectionLease::new(
            "a:80".into(),
            permit(&host_sem),
            permit(&global_sem),
            Arc::clone(&counters),
            Arc::clone(&hosts),
        );
        drop(host_sem);

        drop(first);
        assert_eq!(hosts.len(), 1);
        assert_eq!(counters.hosts_tracked(), 1);
        assert_eq!(counters.host("a:80"), 1);

        drop(second);
        assert!(hosts.is_empty());
        assert_eq!(counters.hosts_tracked(), 0);
        assert_eq!(counters.peak_host(), 2);
    }
}
