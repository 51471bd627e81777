//! Ordered parallel fetching.
//!
//! [`OrderedFetchExecutor`] runs a fixed number of worker tasks over a shared
//! queue and hands results back strictly in submission order, whatever order
//! the fetches complete in.
//!
//! ```text
//! submit() ──► queue ──► worker 0..N ──► orderer ──► ResultStream
//!   seq 0,1,2..          (fetch)        CompletionBuffer
//! ```
//!
//! A window of `max_concurrency` permits bounds how far dispatch may run ahead
//! of the oldest unreleased result, which caps both the number of running
//! fetches and the number of buffered out-of-order results.

mod buffer;
mod config;
mod error;
mod ordered;
mod task;

pub use buffer::CompletionBuffer;
pub use config::{ExecutorConfig, StopPolicy};
pub use error::ExecutorError;
pub use ordered::{OrderedFetchExecutor, ResultStream};
pub use task::{FetchResult, FetchTask};
