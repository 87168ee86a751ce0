//! GraphQL over HTTP.
//!
//! Requests are POSTed as JSON over a fresh HTTP/1.1 connection. Only plain
//! `http://` endpoints are supported.

use super::{Request, Response, Transport};
use crate::error::{ErrorCode, GqlError, GqlResult, ResultExt};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, HOST};
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL, e.g. `http://localhost:4000/graphql`.
    pub url: String,
    /// Applied to each phase: connect, send and read.
    pub timeout: Duration,
    /// Headers sent with every request.
    pub headers: HashMap<String, String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
        }
    }
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == 80 {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Sends requests to a GraphQL endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    endpoint: Endpoint,
}

impl HttpTransport {
    /// Creates a transport with the default configuration.
    pub fn new(url: impl Into<String>) -> GqlResult<Self> {
        Self::with_config(HttpTransportConfig::new(url))
    }

    /// Creates a transport, validating the URL up front.
    pub fn with_config(config: HttpTransportConfig) -> GqlResult<Self> {
        let endpoint = parse_url(&config.url)?;
        Ok(Self { config, endpoint })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn post(&self, request: &Request) -> GqlResult<(StatusCode, Bytes)> {
        let Endpoint { host, port, path } = &self.endpoint;
        let body = serde_json::to_vec(request).map_gql_err(ErrorCode::SerializeError)?;

        debug!(host = %host, port, "connecting");
        let stream = self
            .phase(TcpStream::connect((host.as_str(), *port)))
            .await?
            .map_err(|e| {
                GqlError::new(
                    ErrorCode::ConnectionRefused,
                    format!("Connection to {host}:{port} failed: {e}"),
                )
            })?;

        let (mut sender, connection) = self
            .phase(http1::handshake(TokioIo::new(stream)))
            .await?
            .map_gql_err_with(ErrorCode::NetworkError, "HTTP handshake failed")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!(error = %err, "connection closed with error");
            }
        });

        let mut http_request = hyper::Request::builder()
            .method(Method::POST)
            .uri(path.as_str())
            .body(Full::new(Bytes::from(body)))
            .map_gql_err(ErrorCode::InvalidUrl)?;
        let headers = http_request.headers_mut();
        headers.insert(
            HOST,
            HeaderValue::from_str(&self.endpoint.authority()).map_gql_err(ErrorCode::InvalidUrl)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (key, value) in self.config.headers.iter().chain(&request.headers) {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_gql_err_with(ErrorCode::InvalidConfiguration, format!("Invalid header name: {key}"))?;
            let value = HeaderValue::from_str(value)
                .map_gql_err_with(ErrorCode::InvalidConfiguration, format!("Invalid value for header {key}"))?;
            headers.insert(name, value);
        }

        let response = self
            .phase(sender.send_request(http_request))
            .await?
            .map_gql_err_with(ErrorCode::NetworkError, "Sending request failed")?;
        let status = response.status();
        debug!(status = %status, "received response");

        let body = self
            .phase(response.into_body().collect())
            .await?
            .map_gql_err_with(ErrorCode::NetworkError, "Reading response failed")?
            .to_bytes();
        Ok((status, body))
    }

    async fn phase<F: Future>(&self, future: F) -> GqlResult<F::Output> {
        tokio::time::timeout(self.config.timeout, future)
            .await
            .map_err(|_| GqlError::timeout())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> GqlResult<Response> {
        let (status, body) = self.post(request).await?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                GqlError::deserialize(format!("Failed to parse response: {e}"))
                    .with_extension("body", preview(&body))
            });
        }

        // Servers may report request errors with a 4xx/5xx status.
        match serde_json::from_slice::<Response>(&body) {
            Ok(response) if response.has_errors() => Ok(response),
            _ if body.is_empty() => Err(GqlError::new(
                ErrorCode::HttpError,
                format!("HTTP error: {status}"),
            )
            .with_extension("status", status.as_u16())),
            _ => Err(GqlError::new(
                ErrorCode::HttpError,
                format!("HTTP error: {status}"),
            )
            .with_extension("status", status.as_u16())
            .with_extension("body", preview(&body))),
        }
    }
}

fn preview(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(200).collect()
}

/// Splits an `http://host[:port][/path]` URL.
fn parse_url(url: &str) -> GqlResult<Endpoint> {
    let url = url.trim();

    if url.starts_with("https://") {
        return Err(GqlError::new(
            ErrorCode::HttpsNotSupported,
            "HTTPS is not supported by the HTTP transport. Use a proxy or an http:// endpoint.",
        ));
    }
    let rest = url.strip_prefix("http://").unwrap_or(url);
    if rest.contains("://") {
        return Err(GqlError::new(
            ErrorCode::InvalidUrl,
            format!("Unsupported URL scheme: {url}"),
        ));
    }

    let (authority, path) = match rest.find('/') {
        Some(slash) => rest.split_at(slash),
        None => (rest, "/"),
    };

    let (host, port) = match authority.rfind(':') {
        Some(colon) if !authority[colon..].contains(']') => {
            let port = &authority[colon + 1..];
            let port = port.parse().map_err(|_| {
                GqlError::new(ErrorCode::InvalidUrl, format!("Invalid port: {port}"))
            })?;
            (&authority[..colon], port)
        }
        _ => (authority, 80),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(GqlError::new(
            ErrorCode::InvalidUrl,
            format!("Missing host: {url}"),
        ));
    }

    Ok(Endpoint {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("http://localhost:4000/graphql").expect("valid"),
            Endpoint {
                host: "localhost".into(),
                port: 4000,
                path: "/graphql".into()
            }
        );
        assert_eq!(
            parse_url("api.example.com").expect("valid"),
            Endpoint {
                host: "api.example.com".into(),
                port: 80,
                path: "/".into()
            }
        );
        assert_eq!(parse_url("http://[::1]:8080/gql").expect("valid").host, "::1");

        let err = parse_url("https://api.example.com/graphql").unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpsNotSupported);
        assert_eq!(parse_url("http://localhost:http/").unwrap_err().code, ErrorCode::InvalidUrl);
        assert_eq!(parse_url("http://:8080/").unwrap_err().code, ErrorCode::InvalidUrl);
        assert_eq!(parse_url("ftp://example.com/").unwrap_err().code, ErrorCode::InvalidUrl);
    }

    /// Serves a single canned response and reports the raw request received.
    async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&received).into_owned());
        });

        (format!("http://{addr}/graphql"), rx)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= head_end + 4 + content_length
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_posts_json_and_parses_response() {
        let (url, received) =
            serve_once(http_response("200 OK", r#"{"data":{"film":{"title":"A New Hope"}}}"#)).await;
        let transport = HttpTransport::with_config(
            HttpTransportConfig::new(url).header("Authorization", "Bearer default"),
        )
        .expect("valid url");

        let request = Request::new("{ film { title } }").header("X-Trace", "abc");
        let response = transport.execute(&request).await.expect("response");
        assert_eq!(response.data, Some(json!({"film": {"title": "A New Hope"}})));

        let raw = received.await.expect("request");
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /graphql HTTP/1.1\r\n"), "{raw}");
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("authorization: bearer default"));
        assert!(lower.contains("x-trace: abc"));
        assert!(raw.ends_with(r#"{"query":"{ film { title } }"}"#), "{raw}");
    }

    #[tokio::test]
    async fn test_per_request_headers_override_defaults() {
        let (url, received) = serve_once(http_response("200 OK", r#"{"data":null}"#)).await;
        let transport = HttpTransport::with_config(
            HttpTransportConfig::new(url).header("x-client", "default"),
        )
        .expect("valid url");

        transport
            .execute(&Request::new("{ a }").header("X-Client", "override"))
            .await
            .expect("response");

        let raw = received.await.expect("request").to_ascii_lowercase();
        assert!(raw.contains("x-client: override"));
        assert!(!raw.contains("x-client: default"));
    }

    #[tokio::test]
    async fn test_chunked_response() {
        let body = r#"{"data":{"ok":true}}"#;
        let (head, tail) = body.split_at(9);
        let raw = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{head}\r\n{:x}\r\n{tail}\r\n0\r\n\r\n",
            head.len(),
            tail.len()
        );
        let (url, _) = serve_once(raw).await;
        let transport = HttpTransport::new(url).expect("valid url");

        let response = transport.execute(&Request::new("{ ok }")).await.expect("response");
        assert_eq!(response.data, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let (url, _) = serve_once(http_response("502 Bad Gateway", "upstream down")).await;
        let transport = HttpTransport::new(url).expect("valid url");

        let err = transport.execute(&Request::new("{ a }")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(err.message, "HTTP error: 502 Bad Gateway");
        assert_eq!(err.extension("status"), Some(&json!(502)));
        assert_eq!(err.extension("body"), Some(&json!("upstream down")));
    }

    #[tokio::test]
    async fn test_error_status_with_graphql_errors() {
        let (url, _) = serve_once(http_response(
            "400 Bad Request",
            r#"{"errors":[{"message":"Cannot query field \"nope\" on type \"Query\"."}]}"#,
        ))
        .await;
        let transport = HttpTransport::new(url).expect("valid url");

        let response = transport.execute(&Request::new("{ nope }")).await.expect("response");
        assert!(response.has_errors());
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let (url, _) = serve_once(http_response("200 OK", "<html>oops</html>")).await;
        let transport = HttpTransport::new(url).expect("valid url");

        let err = transport.execute(&Request::new("{ a }")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
        assert_eq!(err.extension("body"), Some(&json!("<html>oops</html>")));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let transport = HttpTransport::new(format!("http://{addr}/graphql")).expect("valid url");
        let err = transport.execute(&Request::new("{ a }")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionRefused);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let transport = HttpTransport::with_config(
            HttpTransportConfig::new(format!("http://{addr}/")).timeout(Duration::from_millis(100)),
        )
        .expect("valid url");
        let err = transport.execute(&Request::new("{ a }")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
    }
}
