//! Security error types.

use thiserror::Error;

/// Failure to build a request context.
///
/// These indicate a broken configuration rather than a transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// BasicAuth configured without username or password
    #[error("username and password configuration of basic auth is required")]
    MissingCredentials,

    /// The target URL has no host to bind credentials to
    #[error("cannot bind credentials to '{0}': URL has no host")]
    NoHost(String),
}

/// Failure while evaluating a host matcher.
///
/// The resolver treats these as "does not match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// URL has no host component
    #[error("URL '{0}' has no host")]
    NoHost(String),

    /// Host name lookup failed
    #[error("failed to resolve host '{host}': {message}")]
    Resolve { host: String, message: String },
}
