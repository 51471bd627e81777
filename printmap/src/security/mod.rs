//! Per-request authentication for outbound tile requests.
//!
//! A [`SecurityStrategyResolver`] holds the configured strategies in order.
//! For every target URL it picks the first strategy whose [`HostMatcher`]
//! accepts the URL and asks it for a fresh [`RequestContext`]. URLs nobody
//! claims go out unauthenticated.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use printmap::security::{
//!     BasicAuthSecurity, HostMatcher, SecurityStrategy, SecurityStrategyResolver,
//! };
//! use url::Url;
//!
//! let basic = BasicAuthSecurity::new("xyz", "yxz").with_preemptive(true);
//! let strategy = SecurityStrategy::basic_auth(basic)
//!     .unwrap()
//!     .with_matcher(HostMatcher::dns("tiles.example.com"));
//! let resolver = SecurityStrategyResolver::new(vec![strategy]);
//!
//! let url = Url::parse("http://tiles.example.com/wms").unwrap();
//! let context = resolver.resolve(&url).await.unwrap();
//! assert!(context.preemptive_authorization(&url).is_some());
//! # }
//! ```

mod context;
mod error;
mod matcher;
mod resolver;
mod strategy;

pub use context::{AuthCache, AuthScheme, AuthScope, AuthTarget, RequestContext, ScopedCredentials};
pub use error::{MatchError, SecurityError};
pub use matcher::HostMatcher;
pub use resolver::SecurityStrategyResolver;
pub use strategy::{BasicAuthSecurity, SecurityStrategy, StrategyKind};

use url::Url;

/// Port of `url`, falling back to the scheme default (80, 443, ...).
pub(crate) fn effective_port(url: &Url) -> Option<u16> {
    url.port_or_known_default()
}
