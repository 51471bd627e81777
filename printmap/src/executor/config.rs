//! Executor configuration.

use std::time::Duration;

use crate::config::{ConnectionSettings, DEFAULT_GLOBAL_PARALLEL_FETCHES, DEFAULT_STOP_TIMEOUT_SECS};

/// What happens to unfinished tasks when the executor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Finish every submitted task
    #[default]
    Drain,
    /// Abort running fetches; every unfinished task yields `Cancelled`
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    max_concurrency: usize,
    stop_policy: StopPolicy,
    stop_timeout: Duration,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config sized to the global connection limit.
    pub fn for_connections(settings: &ConnectionSettings) -> Self {
        Self::default().with_max_concurrency(settings.global_parallel_fetches())
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn stop_policy(&self) -> StopPolicy {
        self.stop_policy
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_GLOBAL_PARALLEL_FETCHES,
            stop_policy: StopPolicy::Drain,
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}
