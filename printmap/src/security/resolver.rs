//! Ordered strategy selection.

use super::context::RequestContext;
use super::error::SecurityError;
use super::strategy::SecurityStrategy;
use tracing::trace;
use url::Url;

/// Picks the security strategy for each outbound request.
#[derive(Debug, Clone, Default)]
pub struct SecurityStrategyResolver {
    strategies: Vec<SecurityStrategy>,
}

impl SecurityStrategyResolver {
    /// Creates a resolver that tries `strategies` in the given order.
    pub fn new(strategies: Vec<SecurityStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[SecurityStrategy] {
        &self.strategies
    }

    /// First strategy accepting `url`, if any.
    pub async fn find(&self, url: &Url) -> Option<&SecurityStrategy> {
        for strategy in &self.strategies {
            if strategy.matches(url).await {
                return Some(strategy);
            }
        }
        None
    }

    /// Builds the request context for `url`.
    ///
    /// URLs that no strategy accepts get an anonymous context.
    pub async fn resolve(&self, url: &Url) -> Result<RequestContext, SecurityError> {
        match self.find(url).await {
            Some(strategy) => {
                trace!(
                    url = %url,
                    strategy = strategy.kind().type_name(),
                    "Security strategy selected"
                );
                strategy.create_context(url)
            }
            None => Ok(RequestContext::none()),
        }
    }
}
