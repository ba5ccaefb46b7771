// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Network boundary for registry submissions.
//!
//! The coordinator only needs "POST these bytes, give me the body back".
//! [`HttpTransport`] does that over reqwest; tests supply their own
//! [`Transport`] implementations.

use crate::config::RegistryConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// One outbound submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: Url,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: String,
    /// JSON body, sent as `Content-Type: application/json`
    pub body: Vec<u8>,
}

/// Performs the HTTP exchange with the registry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the raw response body.
    async fn send(&self, request: TransportRequest) -> Result<Vec<u8>, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.request_timeout())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(&request.bearer_token)
            .body(request.body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        // Error details come back in the body, so non-2xx is not a transport failure.
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(%status, bytes = body.len(), "Registry responded");

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CREATE_PATH: &str = "/api/v3/lk/documents/create";

    fn request_to(addr: std::net::SocketAddr, body: &[u8]) -> TransportRequest {
        TransportRequest {
            url: Url::parse(&format!("http://{addr}{CREATE_PATH}")).unwrap(),
            bearer_token: "secret-token".to_string(),
            body: body.to_vec(),
        }
    }

    /// Read one request: headers, then `Content-Length` bytes of body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_error_status_returns_body_and_sends_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = r#"{"code":"400","error_message":"bad signature"}"#;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });

        let transport = HttpTransport::new(Duration::from_secs(5));
        let body = transport
            .send(request_to(addr, br#"{"signature":"sig"}"#))
            .await
            .unwrap();
        assert_eq!(body, reply.as_bytes());

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with(&format!("POST {CREATE_PATH} HTTP/1.1\r\n")));
        assert!(lower.contains("authorization: bearer secret-token\r\n"));
        assert!(lower.contains("content-type: application/json\r\n"));
        assert!(request.ends_with(r#"{"signature":"sig"}"#));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Hold the connection open without answering.
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let transport = HttpTransport::new(Duration::from_millis(100));
        let err = transport.send(request_to(addr, b"{}")).await.unwrap_err();
        assert_eq!(err, TransportError::Timeout);

        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let transport = HttpTransport::new(Duration::from_secs(2));
        let request = TransportRequest {
            url: Url::parse("http://127.0.0.1:9/api/v3/lk/documents/create").unwrap(),
            bearer_token: "token".to_string(),
            body: b"{}".to_vec(),
        };

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connection(_) | TransportError::Timeout
        ));
    }
}
