//! Connection error types.

use thiserror::Error;

/// Failure to obtain a connection lease.
///
/// Reported as a per-task failure, never as a fatal executor error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// No slot freed up within the connection timeout
    #[error("no connection slot for {host} within {waited_ms} ms")]
    Timeout { host: String, waited_ms: u64 },

    /// The manager has been destroyed
    #[error("connection manager is shut down")]
    Closed,
}

/// Structural connection manager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// A limit or timeout is zero
    #[error("invalid connection setting: {0} must be greater than zero")]
    InvalidSettings(&'static str),

    /// The pooled HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The manager has been destroyed
    #[error("connection manager is shut down")]
    Destroyed,
}
