//! Outbound connection configuration.

use super::defaults::{
    DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_GLOBAL_PARALLEL_FETCHES,
    DEFAULT_PER_HOST_PARALLEL_FETCHES, DEFAULT_SOCKET_TIMEOUT_MS,
};
use super::proxy::ProxySettings;
use std::time::Duration;

/// Limits and timeouts for outbound tile requests.
///
/// # Example
///
/// ```
/// use printmap::config::ConnectionSettings;
///
/// let settings = ConnectionSettings::default();
/// assert_eq!(settings.per_host_parallel_fetches(), 10);
/// assert_eq!(settings.global_parallel_fetches(), 30);
/// assert_eq!(settings.connection_timeout_ms(), 30000);
/// assert_eq!(settings.socket_timeout_ms(), 30000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Maximum concurrent requests per host
    per_host_parallel_fetches: usize,
    /// Maximum concurrent requests overall
    global_parallel_fetches: usize,
    /// Lease wait and TCP connect timeout (milliseconds)
    connection_timeout_ms: u64,
    /// Response timeout (milliseconds)
    socket_timeout_ms: u64,
    /// Proxy for outbound requests; `None` leaves the environment's proxy
    /// settings in effect
    proxy: Option<ProxySettings>,
}

impl ConnectionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_per_host_parallel_fetches(mut self, value: usize) -> Self {
        self.per_host_parallel_fetches = value;
        self
    }

    pub fn with_global_parallel_fetches(mut self, value: usize) -> Self {
        self.global_parallel_fetches = value;
        self
    }

    pub fn with_connection_timeout_ms(mut self, value: u64) -> Self {
        self.connection_timeout_ms = value;
        self
    }

    pub fn with_socket_timeout_ms(mut self, value: u64) -> Self {
        self.socket_timeout_ms = value;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn per_host_parallel_fetches(&self) -> usize {
        self.per_host_parallel_fetches
    }

    pub fn global_parallel_fetches(&self) -> usize {
        self.global_parallel_fetches
    }

    pub fn connection_timeout_ms(&self) -> u64 {
        self.connection_timeout_ms
    }

    pub fn socket_timeout_ms(&self) -> u64 {
        self.socket_timeout_ms
    }

    pub fn proxy(&self) -> Option<&ProxySettings> {
        self.proxy.as_ref()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Checks that every limit and timeout is non-zero.
    ///
    /// Returns the name of the first offending setting.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.per_host_parallel_fetches == 0 {
            return Err("per_host_parallel_fetches");
        }
        if self.global_parallel_fetches == 0 {
            return Err("global_parallel_fetches");
        }
        if self.connection_timeout_ms == 0 {
            return Err("connection_timeout_ms");
        }
        if self.socket_timeout_ms == 0 {
            return Err("socket_timeout_ms");
        }
        Ok(())
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            per_host_parallel_fetches: DEFAULT_PER_HOST_PARALLEL_FETCHES,
            global_parallel_fetches: DEFAULT_GLOBAL_PARALLEL_FETCHES,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            proxy: None,
        }
    }
}
