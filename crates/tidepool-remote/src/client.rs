//! Minimal HTTP/1.1 client.
//!
//! Opens one TCP connection per request and drives it with hyper's
//! low-level `conn` API. Every request is bounded by the client timeout.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

const AGENT: &str = concat!("tidepool/", env!("CARGO_PKG_VERSION"));

/// Errors from a single HTTP exchange.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("connect to {addr} failed: {message}")]
    Connect { addr: String, message: String },

    #[error("http error talking to {url}: {message}")]
    Protocol { url: String, message: String },

    #[error("request to {url} timed out after {}ms", .after.as_millis())]
    Timeout { url: String, after: Duration },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Turn a non-2xx response into `HttpError::Status`.
    pub fn error_for_status(self, method: Method, url: &str) -> Result<Self, HttpError> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(HttpError::Status {
            method,
            url: url.to_string(),
            status: self.status,
            body: String::from_utf8_lossy(&self.body).trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<HttpResponse, HttpError> {
        let body = serde_json::to_vec(body).map_err(|e| HttpError::Protocol {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.send(Method::POST, url, Some(body)).await
    }

    /// Send one request and read the whole response body.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| HttpError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if uri.scheme_str() != Some("http") {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                message: "only http:// is supported".to_string(),
            });
        }
        let authority = uri.authority().cloned().ok_or_else(|| HttpError::InvalidUrl {
            url: url.to_string(),
            message: "missing host".to_string(),
        })?;
        let addr = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let exchange = async {
            let stream = tokio::net::TcpStream::connect(&addr)
                .await
                .map_err(|e| HttpError::Connect {
                    addr: addr.clone(),
                    message: e.to_string(),
                })?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| protocol(url, e))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let mut builder = Request::builder()
                .method(method.clone())
                .uri(path.as_str())
                .header(HOST, authority.as_str())
                .header(USER_AGENT, AGENT);
            if body.is_some() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            let req = builder
                .body(Full::new(Bytes::from(body.unwrap_or_default())))
                .map_err(|e| protocol(url, e))?;

            let resp = sender.send_request(req).await.map_err(|e| protocol(url, e))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| protocol(url, e))?
                .to_bytes();

            debug!(%method, %url, %status, bytes = body.len(), "http exchange");
            Ok::<_, HttpError>(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }),
        }
    }
}

fn protocol(url: &str, e: impl std::fmt::Display) -> HttpError {
    HttpError::Protocol {
        url: url.to_string(),
        message: e.to_string(),
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
