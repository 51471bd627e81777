//! Transport trait and the reqwest implementation.

use bytes::Bytes;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::error::FetchError;
use crate::connection::LeaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A fully prepared outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response as seen by the fetcher. The body is fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends prepared requests.
///
/// Implementations return `Ok` for any response the server produced,
/// whatever its status. Status handling is up to the caller.
pub trait HttpTransport: Send + Sync + 'static {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;
}

/// Pooled client owned by the connection manager and shared with every
/// transport it hands out.
///
/// Closing it drops the manager's client, refuses new sends and aborts the
/// ones in flight, so the pool goes away with the last in-flight clone.
#[derive(Debug, Clone)]
pub(crate) struct SharedClient {
    client: Arc<RwLock<Option<reqwest::Client>>>,
    closed: CancellationToken,
}

impl SharedClient {
    pub(crate) fn new(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(RwLock::new(Some(client))),
            closed: CancellationToken::new(),
        }
    }

    /// A handle on the live client, or `None` once closed.
    fn get(&self) -> Option<reqwest::Client> {
        if self.closed.is_cancelled() {
            return None;
        }
        self.client.read().ok()?.clone()
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
        if let Ok(mut client) = self.client.write() {
            client.take();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Transport backed by a pooled `reqwest::Client`.
///
/// Transports obtained from a connection manager stop working when the
/// manager is destroyed: every send, including one already waiting on the
/// server, fails with [`LeaseError::Closed`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    shared: SharedClient,
}

impl ReqwestTransport {
    /// Standalone transport over `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self::from_shared(SharedClient::new(client))
    }

    pub(crate) fn from_shared(shared: SharedClient) -> Self {
        Self { shared }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let Some(client) = self.shared.get() else {
            return Err(LeaseError::Closed.into());
        };
        let url = request.url.clone();

        tokio::select! {
            biased;
            _ = self.shared.closed.cancelled() => {
                debug!(url = %url, "Request aborted, connection manager destroyed");
                Err(LeaseError::Closed.into())
            }
            result = send_with(&client, request) => result,
        }
    }
}

async fn send_with(client: &reqwest::Client, request: HttpRequest) -> Result<HttpResponse, FetchError> {
    let url = request.url.clone();
    let mut builder = match request.method {
        HttpMethod::Get => client.get(&url),
        HttpMethod::Post => client.post(&url),
    };
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(|e| {
        warn!(url = %url, error = %e, "HTTP request failed");
        transport_error(&url, &e)
    })?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let body = response.bytes().await.map_err(|e| {
        warn!(url = %url, error = %e, "Failed to read response body");
        transport_error(&url, &e)
    })?;

    trace!(url = %url, status = status, bytes = body.len(), "HTTP response received");

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn transport_error(url: &str, error: &reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: error.to_string(),
        timeout: error.is_timeout(),
        connect: error.is_connect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{stalled_server, tile_server};

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(401, Bytes::new())
            .with_header("WWW-Authenticate", "Basic realm=\"tiles\"");
        assert_eq!(response.header("www-authenticate"), Some("Basic realm=\"tiles\""));
        assert_eq!(response.header("authorization"), None);
        assert!(!response.is_success());
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new(HttpMethod::Post, "http://a/wms")
            .with_header("Authorization", "Basic eHl6Onl4eg==")
            .with_body(Bytes::from_static(b"<GetMap/>"));
        assert_eq!(request.header("AUTHORIZATION"), Some("Basic eHl6Onl4eg=="));
        assert_eq!(request.body.as_deref(), Some(&b"<GetMap/>"[..]));
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_connect_failure() {
        // Bind then drop to get a port with nothing listening
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .send(HttpRequest::new(HttpMethod::Get, format!("http://{}/tile.png", addr)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_closed_shared_client_refuses_sends() {
        let addr = tile_server("tile").await;
        let shared = SharedClient::new(reqwest::Client::new());
        let transport = ReqwestTransport::from_shared(shared.clone());
        let url = format!("http://{}/0/0/0.png", addr);

        let response = transport
            .send(HttpRequest::new(HttpMethod::Get, url.clone()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"tile");

        shared.close();

        assert!(transport.is_closed());
        let err = transport
            .send(HttpRequest::new(HttpMethod::Get, url))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Lease(LeaseError::Closed));
    }

    #[tokio::test]
    async fn test_close_aborts_request_in_flight() {
        let addr = stalled_server().await;
        let shared = SharedClient::new(reqwest::Client::new());
        let transport = ReqwestTransport::from_shared(shared.clone());

        let pending = tokio::spawn(async move {
            transport
                .send(HttpRequest::new(HttpMethod::Get, format!("http://{}/slow.png", addr)))
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shared.close();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), pending)
            .await
            .expect("send returns after close")
            .unwrap();
        assert_eq!(result, Err(FetchError::Lease(LeaseError::Closed)));
    }
}
