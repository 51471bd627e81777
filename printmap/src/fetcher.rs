//! Single-request fetch logic: lease, authenticate, send.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};
use url::Url;

use crate::connection::{host_key, ConnectionResourceManager};
use crate::http::{FetchError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::security::{RequestContext, SecurityStrategyResolver};

/// What a worker fetches for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub body: Option<Bytes>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            body: None,
        }
    }

    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            method: HttpMethod::Post,
            body: Some(body.into()),
        }
    }

    /// Parses `url` into a GET request.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        Url::parse(url)
            .map(Self::get)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
    }
}

/// Something that turns a request into a payload.
///
/// The executor runs one of these per worker slot.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Fetcher that honours connection limits and endpoint security rules.
pub struct TileFetcher<T> {
    connections: Arc<ConnectionResourceManager>,
    security: Arc<SecurityStrategyResolver>,
    transport: T,
}

impl<T: HttpTransport> TileFetcher<T> {
    pub fn new(
        connections: Arc<ConnectionResourceManager>,
        security: Arc<SecurityStrategyResolver>,
        transport: T,
    ) -> Self {
        Self {
            connections,
            security,
            transport,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionResourceManager> {
        &self.connections
    }

    async fn fetch_with_lease(&self, request: &FetchRequest) -> Result<Bytes, FetchError> {
        let url = &request.url;
        let host = host_key(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        // Matcher lookups happen before a connection slot is taken
        let context = self.security.resolve(url).await?;

        let mut lease = self.connections.acquire(&host).await?;
        let result = self.authenticated_send(request, &context).await;
        lease.release();

        let response = result?;
        check_status(url, response)
    }

    async fn authenticated_send(
        &self,
        request: &FetchRequest,
        context: &RequestContext,
    ) -> Result<HttpResponse, FetchError> {
        let url = &request.url;

        let preemptive = context.preemptive_authorization(url);
        let sent_credentials = preemptive.is_some();
        let response = self.transport.send(build_request(request, preemptive)).await?;

        if response.status != 401 || sent_credentials {
            return Ok(response);
        }

        match challenge_answer(context, url, &response) {
            Some(authorization) => {
                debug!(url = %url, "Answering Basic challenge");
                self.transport
                    .send(build_request(request, Some(authorization)))
                    .await
            }
            None => Ok(response),
        }
    }
}

impl<T: HttpTransport> Fetch for TileFetcher<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, FetchError> {
        trace!(url = %request.url, "Fetching");
        self.fetch_with_lease(request).await
    }
}

fn build_request(request: &FetchRequest, authorization: Option<String>) -> HttpRequest {
    let mut http = HttpRequest::new(request.method, request.url.as_str());
    if let Some(body) = &request.body {
        http = http.with_body(body.clone());
    }
    if let Some(value) = authorization {
        http = http.with_header("Authorization", value);
    }
    http
}

fn challenge_answer(context: &RequestContext, url: &Url, response: &HttpResponse) -> Option<String> {
    let challenge = response.header("WWW-Authenticate")?;
    context.challenge_authorization(url, challenge)
}

fn check_status(url: &Url, response: HttpResponse) -> Result<Bytes, FetchError> {
    match response.status {
        s if (200..300).contains(&s) => Ok(response.body),
        401 => Err(FetchError::Unauthorized {
            url: url.to_string(),
        }),
        status => Err(FetchError::Status {
            status,
            url: url.to_string(),
        }),
    }
}
