//! Outbound connection resources.
//!
//! The [`ConnectionResourceManager`] owns the pooled HTTP client and caps the
//! number of concurrent requests per host and overall. Every request holds a
//! [`ConnectionLease`] while it talks to the server:
//!
//! ```ignore
//! let manager = ConnectionResourceManager::init(ConnectionSettings::default())?;
//!
//! let lease = manager.acquire("tiles.example.com:443").await?;
//! // request happens here...
//! drop(lease); // both the host and the global slot are freed
//!
//! manager.destroy();
//! ```

mod error;
mod lease;
mod manager;

pub use error::{ConnectionError, LeaseError};
pub use lease::ConnectionLease;
pub use manager::ConnectionResourceManager;

use url::Url;

/// Key under which per-host limits are tracked: `host:port`.
///
/// The port falls back to the scheme default, so `http://a/` and
/// `http://a:80/` share one limit. Returns `None` for URLs without a host.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    match url.port_or_known_default() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_uses_default_port() {
        let a = Url::parse("http://Tiles.Example.com/wms").unwrap();
        let b = Url::parse("http://tiles.example.com:80/tms").unwrap();
        let c = Url::parse("https://tiles.example.com/wms").unwrap();

        assert_eq!(host_key(&a).as_deref(), Some("tiles.example.com:80"));
        assert_eq!(host_key(&a), host_key(&b));
        assert_eq!(host_key(&c).as_deref(), Some("tiles.example.com:443"));
    }

    #[test]
    fn test_host_key_requires_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(host_key(&url), None);
    }
}
