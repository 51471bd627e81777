//! Process-wide fetch resources and their lifecycle.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigFile, ConnectionSettings};
use crate::connection::{ConnectionError, ConnectionResourceManager};
use crate::executor::{ExecutorConfig, ExecutorError, FetchResult, OrderedFetchExecutor};
use crate::fetcher::{FetchRequest, TileFetcher};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::security::SecurityStrategyResolver;

#[derive(Debug, Error)]
pub enum ResourcesError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Owns the connection manager, the security resolver and a long-lived
/// executor.
///
/// Created once at startup with [`init`](Self::init) and torn down once
/// with [`destroy`](Self::destroy).
pub struct FetchResources<T: HttpTransport = ReqwestTransport> {
    connections: Arc<ConnectionResourceManager>,
    security: Arc<SecurityStrategyResolver>,
    fetcher: Arc<TileFetcher<T>>,
    executor_config: ExecutorConfig,
    executor: OrderedFetchExecutor,
}

impl FetchResources<ReqwestTransport> {
    /// Builds resources that talk to real servers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn init(
        settings: ConnectionSettings,
        security: SecurityStrategyResolver,
    ) -> Result<Self, ResourcesError> {
        let connections = ConnectionResourceManager::init(settings)?;
        let transport = connections.transport()?;
        Self::assemble(connections, security, transport)
    }

    pub fn from_config(config: &ConfigFile) -> Result<Self, ResourcesError> {
        Self::init(config.connections.clone(), config.security_resolver())
    }
}

impl<T: HttpTransport> FetchResources<T> {
    /// Builds resources around a caller-supplied transport.
    pub fn with_transport(
        settings: ConnectionSettings,
        security: SecurityStrategyResolver,
        transport: T,
    ) -> Result<Self, ResourcesError> {
        let connections = ConnectionResourceManager::init(settings)?;
        Self::assemble(connections, security, transport)
    }

    fn assemble(
        connections: ConnectionResourceManager,
        security: SecurityStrategyResolver,
        transport: T,
    ) -> Result<Self, ResourcesError> {
        let executor_config = ExecutorConfig::for_connections(connections.settings());
        let connections = Arc::new(connections);
        let security = Arc::new(security);
        let fetcher = Arc::new(TileFetcher::new(
            Arc::clone(&connections),
            Arc::clone(&security),
            transport,
        ));
        let executor = OrderedFetchExecutor::start(executor_config, Arc::clone(&fetcher))?;

        info!(
            strategies = security.strategies().len(),
            workers = executor_config.max_concurrency(),
            "Fetch resources initialized"
        );

        Ok(Self {
            connections,
            security,
            fetcher,
            executor_config,
            executor,
        })
    }

    pub fn connections(&self) -> &Arc<ConnectionResourceManager> {
        &self.connections
    }

    pub fn security(&self) -> &Arc<SecurityStrategyResolver> {
        &self.security
    }

    pub fn fetcher(&self) -> &Arc<TileFetcher<T>> {
        &self.fetcher
    }

    /// Long-lived executor sized to the global connection limit.
    pub fn executor(&self) -> &OrderedFetchExecutor {
        &self.executor
    }

    /// Fetches a batch on a dedicated executor and returns the results in
    /// request order.
    pub async fn fetch_all(
        &self,
        requests: impl IntoIterator<Item = FetchRequest>,
    ) -> Result<Vec<FetchResult>, ResourcesError> {
        let executor = OrderedFetchExecutor::start(self.executor_config, Arc::clone(&self.fetcher))?;
        let results = executor.results().ok_or(ExecutorError::Stopped)?;

        for request in requests {
            executor.submit(request)?;
        }
        executor.stop().await?;

        Ok(results.collect().await)
    }

    /// Shuts down the connection manager, then the executor.
    ///
    /// The executor is stopped even when connections are already gone, so
    /// in-flight fetches fail with a closed lease instead of hanging.
    pub async fn destroy(&self) -> Result<(), ResourcesError> {
        self.connections.destroy();
        self.executor.stop().await?;
        info!("Fetch resources destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LeaseError;
    use crate::http::mock::MockTransport;
    use crate::http::FetchError;
    use std::time::Duration;
    use url::Url;

    fn requests(count: usize) -> Vec<FetchRequest> {
        (0..count)
            .map(|i| {
                let host = if i % 2 == 0 { "a.example.com" } else { "b.example.com" };
                FetchRequest::get(Url::parse(&format!("http://{}/{}", host, i)).unwrap())
            })
            .collect()
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings::new()
            .with_per_host_parallel_fetches(2)
            .with_global_parallel_fetches(3)
    }

    #[tokio::test]
    async fn test_fetch_all_returns_request_order() {
        let transport = MockTransport::echo().with_delay(Duration::from_millis(2));
        let resources =
            FetchResources::with_transport(settings(), SecurityStrategyResolver::default(), transport)
                .unwrap();

        let results = resources.fetch_all(requests(12)).await.unwrap();

        assert_eq!(results.len(), 12);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.seq, i as u64);
            assert_eq!(result.bytes().unwrap(), result.url.as_str().as_bytes());
        }
        assert!(resources.connections().peak_in_flight() <= 3);
        assert!(resources.connections().peak_host_in_flight() <= 2);
        assert_eq!(resources.connections().in_flight(), 0);

        resources.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_executor_sized_to_global_limit() {
        let resources = FetchResources::with_transport(
            settings(),
            SecurityStrategyResolver::default(),
            MockTransport::echo(),
        )
        .unwrap();

        assert_eq!(resources.executor().config().max_concurrency(), 3);
        resources.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_closes_everything() {
        let resources = FetchResources::with_transport(
            settings(),
            SecurityStrategyResolver::default(),
            MockTransport::echo(),
        )
        .unwrap();

        resources.destroy().await.unwrap();

        assert!(resources.connections().is_destroyed());
        assert!(resources.executor().is_stopped());
        assert!(matches!(
            resources.executor().submit(requests(1).remove(0)),
            Err(ExecutorError::Stopped)
        ));

        // A batch after destroy still completes, every task failing cleanly
        let results = resources.fetch_all(requests(2)).await.unwrap();
        assert!(results
            .iter()
            .all(|r| r.error() == Some(&FetchError::Lease(LeaseError::Closed))));

        // Repeat destroy is harmless
        resources.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_settings() {
        let result = FetchResources::init(
            ConnectionSettings::new().with_global_parallel_fetches(0),
            SecurityStrategyResolver::default(),
        );
        assert!(matches!(
            result,
            Err(ResourcesError::Connection(ConnectionError::InvalidSettings(_)))
        ));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = ConfigFile::parse(
            "[connections]\nglobal_parallel_fetches = 5\n\n[security.open]\ntype = noAuth\n",
        )
        .unwrap();
        let resources = FetchResources::from_config(&config).unwrap();

        assert_eq!(resources.connections().settings().global_parallel_fetches(), 5);
        assert_eq!(resources.security().strategies().len(), 1);
        resources.destroy().await.unwrap();
    }
}
