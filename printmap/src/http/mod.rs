//! HTTP request/response types and the transport seam.
//!
//! Production code sends through [`ReqwestTransport`], which shares the
//! pooled client owned by the connection manager. Tests plug in their own
//! [`HttpTransport`] implementations.

mod error;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use error::FetchError;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub(crate) use transport::SharedClient;
