//! Scripted transport for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{FetchError, HttpRequest, HttpResponse, HttpTransport};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, FetchError> + Send + Sync;

/// Answers every request through `handler` after an optional delay and
/// remembers what was sent.
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: Arc<Handler>,
    delay: Duration,
    sent: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            delay: Duration::ZERO,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Transport answering 200 with the request URL as body.
    pub(crate) fn echo() -> Self {
        Self::new(|req| Ok(HttpResponse::new(200, req.url.clone().into_bytes())))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.sent.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

/// Minimal HTTP/1.1 server answering every connection with 200 and `body`.
pub(crate) async fn tile_server(body: &'static str) -> std::net::SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    addr
}

/// Server that accepts connections and never answers.
pub(crate) async fn stalled_server() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    addr
}
