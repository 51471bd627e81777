//! Connection resource manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::error::{ConnectionError, LeaseError};
use super::lease::{prune_host, ConnectionLease, HostSemaphores, LeaseCounters};
use crate::config::ConnectionSettings;
use crate::http::{ReqwestTransport, SharedClient};

/// Owns the pooled HTTP client and the per-host and global request limits.
///
/// Created once with [`init`](Self::init) and shut down once with
/// [`destroy`](Self::destroy). After destruction every pending and future
/// [`acquire`](Self::acquire) fails with [`LeaseError::Closed`].
///
/// Per-host limits are created on first use and dropped once no lease or
/// waiter refers to them.
pub struct ConnectionResourceManager {
    settings: ConnectionSettings,
    global: Arc<Semaphore>,
    hosts: Arc<HostSemaphores>,
    counters: Arc<LeaseCounters>,
    client: SharedClient,
    destroyed: AtomicBool,
}

impl ConnectionResourceManager {
    /// Validates the settings and builds the pooled client.
    ///
    /// A configured proxy replaces any proxy taken from the environment.
    pub fn init(settings: ConnectionSettings) -> Result<Self, ConnectionError> {
        settings
            .validate()
            .map_err(ConnectionError::InvalidSettings)?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(settings.connection_timeout())
            .timeout(settings.socket_timeout())
            .pool_max_idle_per_host(settings.per_host_parallel_fetches());

        if let Some(proxy) = settings.proxy().cloned() {
            info!(
                proxy = %proxy.url(),
                no_proxy = ?proxy.no_proxy(),
                "Routing requests through proxy"
            );
            builder = builder
                .no_proxy()
                .proxy(reqwest::Proxy::custom(move |url| proxy.proxy_for(url).cloned()));
        }

        let client = builder
            .build()
            .map_err(|e| ConnectionError::Client(e.to_string()))?;

        info!(
            per_host = settings.per_host_parallel_fetches(),
            global = settings.global_parallel_fetches(),
            connection_timeout_ms = settings.connection_timeout_ms(),
            socket_timeout_ms = settings.socket_timeout_ms(),
            "Connection manager initialized"
        );

        Ok(Self {
            global: Arc::new(Semaphore::new(settings.global_parallel_fetches())),
            settings,
            hosts: Arc::default(),
            counters: Arc::new(LeaseCounters::default()),
            client: SharedClient::new(client),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Waits for a slot on `host` and a global slot.
    ///
    /// The host slot is taken first so a burst against one slow host does
    /// not park global slots that other hosts could use. Gives up after the
    /// connection timeout.
    pub async fn acquire(&self, host: &str) -> Result<ConnectionLease, LeaseError> {
        if self.is_destroyed() {
            return Err(LeaseError::Closed);
        }

        let host_semaphore = self.host_semaphore(host);
        let global = Arc::clone(&self.global);
        let timeout = self.settings.connection_timeout();
        let started = Instant::now();

        let permits = tokio::time::timeout(timeout, async move {
            let host_permit = host_semaphore.acquire_owned().await?;
            let global_permit = global.acquire_owned().await?;
            Ok::<(OwnedSemaphorePermit, OwnedSemaphorePermit), tokio::sync::AcquireError>((
                host_permit,
                global_permit,
            ))
        })
        .await;

        match permits {
            Ok(Ok((host_permit, global_permit))) => {
                // destroy() may have run between the permit grant and here
                if self.is_destroyed() {
                    drop((host_permit, global_permit));
                    prune_host(&self.hosts, host);
                    return Err(LeaseError::Closed);
                }
                debug!(
                    host = host,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Connection lease acquired"
                );
                Ok(ConnectionLease::new(
                    host.to_string(),
                    host_permit,
                    global_permit,
                    Arc::clone(&self.counters),
                    Arc::clone(&self.hosts),
                ))
            }
            Ok(Err(_)) => {
                prune_host(&self.hosts, host);
                Err(LeaseError::Closed)
            }
            Err(_) => {
                prune_host(&self.hosts, host);
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(host = host, waited_ms = waited_ms, "Timed out waiting for connection slot");
                Err(LeaseError::Timeout {
                    host: host.to_string(),
                    waited_ms,
                })
            }
        }
    }

    /// Transport sharing this manager's pooled client.
    ///
    /// The transport is tied to the manager: once [`destroy`](Self::destroy)
    /// runs, its sends fail with [`LeaseError::Closed`].
    pub fn transport(&self) -> Result<ReqwestTransport, ConnectionError> {
        if self.is_destroyed() || self.client.is_closed() {
            return Err(ConnectionError::Destroyed);
        }
        Ok(ReqwestTransport::from_shared(self.client.clone()))
    }

    /// Closes every limit, aborts requests in flight on this manager's
    /// transports and drops the client. Safe to call more than once.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.global.close();
        for entry in self.hosts.iter() {
            entry.value().close();
        }
        self.client.close();

        info!(
            in_flight = self.in_flight(),
            peak_in_flight = self.peak_in_flight(),
            "Connection manager destroyed"
        );
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Leases currently outstanding across all hosts.
    pub fn in_flight(&self) -> usize {
        self.counters.global()
    }

    /// Leases currently outstanding for one host key.
    pub fn host_in_flight(&self, host: &str) -> usize {
        self.counters.host(host)
    }

    /// Highest number of simultaneous leases seen.
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_global()
    }

    /// Highest number of simultaneous leases seen for any single host.
    pub fn peak_host_in_flight(&self) -> usize {
        self.counters.peak_host()
    }

    /// Hosts with a live per-host limit.
    pub fn hosts_tracked(&self) -> usize {
        self.hosts.len()
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let entry = self.hosts.entry(host.to_string()).or_insert_with(|| {
            let semaphore = Arc::new(Semaphore::new(self.settings.per_host_parallel_fetches()));
            if self.is_destroyed() {
                semaphore.close();
            }
            semaphore
        });
        Arc::clone(entry.value())
    }
}

impl std::fmt::Debug for ConnectionResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionResourceManager")
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
