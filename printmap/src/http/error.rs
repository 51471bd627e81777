//! Per-task fetch failures.

use crate::connection::LeaseError;
use crate::security::SecurityError;
use thiserror::Error;

/// Why a single fetch produced no payload.
///
/// Cloneable so that result consumers can fan failures out without
/// borrowing from the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Lease(#[from] LeaseError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The request never produced a response
    #[error("request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        timeout: bool,
        connect: bool,
    },

    /// Non-success status other than 401
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The server rejected the request and no credentials could answer it
    #[error("authentication required for {url}")]
    Unauthorized { url: String },

    /// The executor was stopped before this task finished
    #[error("fetch cancelled")]
    Cancelled,

    /// The fetch routine panicked
    #[error("fetch panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Whether the failure came from a timeout rather than a server answer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { timeout: true, .. } | FetchError::Lease(LeaseError::Timeout { .. })
        )
    }
}
