//! Units of work and their results.

use bytes::Bytes;
use url::Url;

use crate::fetcher::FetchRequest;
use crate::http::FetchError;

/// A submitted request tagged with its sequence number.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub seq: u64,
    pub request: FetchRequest,
}

/// Outcome of one task, released in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub seq: u64,
    pub url: Url,
    pub outcome: Result<Bytes, FetchError>,
}

impl FetchResult {
    pub(crate) fn new(task: &FetchTask, outcome: Result<Bytes, FetchError>) -> Self {
        Self {
            seq: task.seq,
            url: task.request.url.clone(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }

    pub fn into_outcome(self) -> Result<Bytes, FetchError> {
        self.outcome
    }
}
