//! Executor lifecycle errors.

use thiserror::Error;

/// Structural executor failures. Per-task failures travel inside
/// [`FetchResult`](super::FetchResult) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("executor needs at least one worker")]
    NoWorkers,

    #[error("executor must be started inside a tokio runtime")]
    NoRuntime,

    #[error("executor is stopped")]
    Stopped,

    /// Workers were still busy when the stop deadline passed
    #[error("executor did not stop within {timeout_ms} ms")]
    StopTimeout { timeout_ms: u64 },
}
