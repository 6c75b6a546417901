//! HTTP transport for streaming connections.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use tickwire_types::{Result, TransportError};
use tracing::debug;

use crate::request::PreparedRequest;
use crate::throttle::ConnectThrottle;

/// Characters of an error response body kept in [`TransportError::Status`].
const ERROR_BODY_CHARS: usize = 512;

/// Body of an open streaming response.
pub type BodyStream = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// Configuration for the streaming transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Longest gap between body reads before the stream is considered dead.
    pub read_timeout: Duration,
    /// Minimum spacing between connection attempts, process-wide.
    pub min_connect_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            // Heartbeats arrive every few seconds on a healthy stream
            read_timeout: Duration::from_secs(30),
            min_connect_interval: Duration::from_millis(500),
        }
    }
}

/// HTTP client that opens streaming connections.
#[derive(Debug, Clone)]
pub struct StreamClient {
    client: Client,
    config: ClientConfig,
}

impl StreamClient {
    /// Creates a new stream client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            // One long-lived connection per stream; nothing to pool
            .pool_max_idle_per_host(0)
            // Disable Nagle's algorithm for lower latency
            .tcp_nodelay(true)
            // Keep TCP connections alive
            .tcp_keepalive(Duration::from_secs(60))
            // No total request timeout: the body never completes on a healthy stream
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .gzip(true)
            .build()
            .map_err(transport_error)?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a streaming connection and returns its body.
    ///
    /// Headers, including `user-agent`, come from the prepared request.
    /// Dropping the returned stream closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`tickwire_types::StreamError::TransportFailure`] if the
    /// connection fails, times out, or the server answers with a non-2xx
    /// status.
    pub async fn open(&self, request: &PreparedRequest) -> Result<BodyStream> {
        let waited = ConnectThrottle::global()
            .acquire(self.config.min_connect_interval)
            .await;
        if !waited.is_zero() {
            debug!(waited_ms = waited.as_millis() as u64, "connect throttled");
        }

        let mut builder = self.client.request(request.method.clone(), &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(status = status.as_u16(), error = %err, "failed to read error body");
                    String::new()
                }
            };
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.trim().chars().take(ERROR_BODY_CHARS).collect(),
            }
            .into());
        }

        debug!(status = status.as_u16(), uri = %request.uri, "stream connected");
        Ok(response.bytes_stream().map_err(transport_error).boxed())
    }
}

/// Maps a reqwest error onto the transport taxonomy.
fn transport_error(error: reqwest::Error) -> TransportError {
    let message = error.to_string();
    if error.is_timeout() {
        TransportError::Timeout(message)
    } else if error.is_connect() {
        TransportError::Connect(message)
    } else if error.is_body() || error.is_decode() {
        TransportError::Body(message)
    } else {
        TransportError::Request(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamRequest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one raw HTTP response and returns the request head it received.
    async fn serve_once(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{addr}/v1/events"), handle)
    }

    fn fast_client() -> StreamClient {
        StreamClient::new(ClientConfig {
            min_connect_interval: Duration::ZERO,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.min_connect_interval, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = StreamClient::with_defaults();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_open_streams_body_and_sends_headers() {
        let (uri, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{\"heartbeat\":{}}\n",
        )
        .await;

        let request = StreamRequest::new(uri)
            .with_option("accountIds", ["1"])
            .with_header("X-Desk", "fx")
            .prepare();
        let body = fast_client().open(&request).await.unwrap();
        let chunks: Vec<_> = body.collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.unwrap().to_vec())
            .collect();
        assert_eq!(bytes, b"{\"heartbeat\":{}}\n");

        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /v1/events?accountids=1 http/1.1"));
        assert!(head.contains("x-desk: fx"));
        assert!(head.contains("accept: application/json"));
        assert!(head.contains("user-agent: tickwire/"));
    }

    #[tokio::test]
    async fn test_caller_user_agent_reaches_server() {
        let (uri, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let request = StreamRequest::new(uri)
            .with_header("User-Agent", "desk-monitor/2.1")
            .prepare();
        let body = fast_client().open(&request).await.unwrap();
        drop(body);

        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.contains("user-agent: desk-monitor/2.1"));
        assert!(!head.contains("user-agent: tickwire/"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_empty() {
        let (uri, _server) = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial",
        )
        .await;

        let request = StreamRequest::new(uri).prepare();
        match fast_client().open(&request).await {
            Err(tickwire_types::StreamError::TransportFailure(TransportError::Status {
                status,
                body,
            })) => {
                assert_eq!(status, 503);
                assert!(body.is_empty());
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected a status error"),
        }
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let (uri, _server) = serve_once(
            b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nbad token  \n",
        )
        .await;

        let request = StreamRequest::new(uri).prepare();
        let Err(err) = fast_client().open(&request).await else {
            panic!("expected a status error");
        };
        match err {
            tickwire_types::StreamError::TransportFailure(TransportError::Status {
                status,
                body,
            }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = StreamRequest::new(format!("http://{addr}/v1/events")).prepare();
        let Err(err) = fast_client().open(&request).await else {
            panic!("expected a connection error");
        };
        assert!(err.is_transport());
    }
}
